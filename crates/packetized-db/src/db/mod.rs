//! Database repositories for data access layer
//!
//! Each repository owns a `PgPool` clone and maps rows into `packetized_core` models.
//! Queries are built at runtime with `sqlx::query` so builds do not need a live
//! database or `sqlx prepare`.

pub mod asset;
pub mod representation;

pub use asset::AssetRepository;
pub use representation::RepresentationRepository;
