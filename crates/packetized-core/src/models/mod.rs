//! Data models for the transcoding pipeline

mod asset;
mod format;
mod job;
mod representation;

pub use asset::*;
pub use format::*;
pub use job::*;
pub use representation::*;
