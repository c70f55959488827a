//! Packetized Storage Library
//!
//! Blob store abstraction used by the upload path and the transcoding pipeline,
//! with implementations for Google Cloud Storage and S3 (via `object_store`) and the
//! local filesystem.
//!
//! # Object key format
//!
//! - raw upload: `videos/{asset_id}/{asset_id}{ext}`
//! - published artifact: `videos/{asset_id}/{FORMAT}/{relative_path}`
//! - manifests: `videos/{asset_id}/HLS/playlist.m3u8`, `videos/{asset_id}/DASH/manifest.mpd`
//!
//! Keys must not contain `..` or a leading `/`. Key generation lives in the
//! `keys` module so the upload handler, the publisher and the stream handler agree.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-cloud")]
pub mod object;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-cloud")]
pub use object::ObjectStorage;
pub use packetized_core::StorageBackend;
pub use traits::{Storage, StorageError, StorageResult};
