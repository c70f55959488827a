//! Storage abstraction trait
//!
//! This module defines the Storage trait that all blob store backends implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("URL signing failed: {0}")]
    SigningFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Blob store abstraction
///
/// Writes may not be immediately visible to `exists`/`get` on eventually consistent
/// backends; callers that read right after another process wrote must poll.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key` with the given content type, replacing any existing object.
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<()>;

    /// Store the contents of a local file under `key`, returning the number of bytes stored.
    ///
    /// Backends that can stream should override this; the default reads the file into memory.
    async fn put_file(&self, key: &str, content_type: &str, src: &Path) -> StorageResult<u64> {
        let data = tokio::fs::read(src).await?;
        let size = data.len() as u64;
        self.put(key, content_type, Bytes::from(data)).await?;
        Ok(size)
    }

    /// Fetch a whole object into memory.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Write an object to a local file, returning the number of bytes written.
    ///
    /// Backends that can stream should override this; the default buffers the object.
    async fn download_to_file(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        let data = self.get(key).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(data.len() as u64)
    }

    /// Check whether an object is currently visible.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Time limited GET URL for `key`. Does not check that the object exists.
    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Unsigned public URL of `key`.
    fn public_url(&self, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
