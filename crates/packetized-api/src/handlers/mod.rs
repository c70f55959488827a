pub mod health;
pub mod stream;
pub mod upload;
