//! Packetized Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! the storage, processing, worker and API crates.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PipelineConfig, StorageConfig, TranscoderConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    Asset, AssetId, AssetStatus, FailureReason, LadderRung, NewAsset, NewRepresentation,
    Representation, StreamFormat, TranscodeJob,
};
pub use storage_types::StorageBackend;
