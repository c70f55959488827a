#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-cloud")]
use crate::ObjectStorage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use packetized_core::StorageConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.backend {
        #[cfg(feature = "storage-cloud")]
        StorageBackend::Gcs => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                StorageError::ConfigError("STORAGE_BUCKET not configured".to_string())
            })?;

            let storage = ObjectStorage::gcs(
                bucket,
                config.gcs_service_account_path.clone(),
                config.public_base_url.clone(),
            )?;
            Ok(Arc::new(storage))
        }

        #[cfg(feature = "storage-cloud")]
        StorageBackend::S3 => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                StorageError::ConfigError("STORAGE_BUCKET not configured".to_string())
            })?;
            let region = config
                .s3_region
                .clone()
                .unwrap_or_else(|| "us-east-1".to_string());

            let storage = ObjectStorage::s3(
                bucket,
                region,
                config.s3_endpoint.clone(),
                config.public_base_url.clone(),
            )?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-cloud"))]
        StorageBackend::Gcs | StorageBackend::S3 => Err(StorageError::ConfigError(format!(
            "{} storage backend not available (storage-cloud feature not enabled)",
            config.backend
        ))),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
