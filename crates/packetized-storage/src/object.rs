use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutMultipartOptions, PutOptions,
    PutPayload, Result as ObjectResult, WriteMultipart,
};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Part size for multipart uploads. Files no larger than this use a single put.
const MULTIPART_CHUNK_SIZE: usize = 8 * 1024 * 1024;
/// Parts in flight per multipart upload.
const MULTIPART_MAX_CONCURRENCY: usize = 4;

/// Cloud blob store backed by `object_store`.
///
/// Used for Google Cloud Storage (the default deployment) and S3 or S3-compatible
/// providers. Both support V4 signed GET URLs through `Signer`.
#[derive(Clone)]
pub struct ObjectStorage<S> {
    store: S,
    backend: StorageBackend,
    bucket: String,
    public_base_url: String,
}

impl ObjectStorage<GoogleCloudStorage> {
    /// Create a GCS-backed store.
    ///
    /// Credentials come from `service_account_path` when given, otherwise from the
    /// standard `GOOGLE_*` environment variables.
    pub fn gcs(
        bucket: String,
        service_account_path: Option<String>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket.clone());

        if let Some(path) = service_account_path {
            builder = builder.with_service_account_path(path);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let public_base_url = public_base_url
            .unwrap_or_else(|| format!("https://storage.googleapis.com/{}", bucket));

        Ok(Self::with_store(
            store,
            StorageBackend::Gcs,
            bucket,
            public_base_url,
        ))
    }
}

impl ObjectStorage<AmazonS3> {
    /// Create an S3-backed store.
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn s3(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        // Path-style for S3-compatible providers, virtual-hosted style for AWS.
        let public_base_url = public_base_url.unwrap_or_else(|| match endpoint_url {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        });

        Ok(Self::with_store(
            store,
            StorageBackend::S3,
            bucket,
            public_base_url,
        ))
    }
}

impl<S> ObjectStorage<S> {
    pub fn with_store(
        store: S,
        backend: StorageBackend,
        bucket: String,
        public_base_url: String,
    ) -> Self {
        Self {
            store,
            backend,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

fn location(key: &str) -> StorageResult<ObjectPath> {
    crate::keys::validate_key(key)?;
    Ok(ObjectPath::from(key.to_string()))
}

fn content_type_attributes(content_type: &str) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(Attribute::ContentType, content_type.to_string().into());
    attributes
}

#[async_trait]
impl<S> Storage for ObjectStorage<S>
where
    S: ObjectStore + Signer,
{
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<()> {
        let location = location(key)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let options = PutOptions {
            attributes: content_type_attributes(content_type),
            ..Default::default()
        };

        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(data), options)
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                backend = %self.backend,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object put failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::debug!(
            backend = %self.backend,
            bucket = %self.bucket,
            key = %key,
            content_type = %content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object put successful"
        );

        Ok(())
    }

    async fn put_file(&self, key: &str, content_type: &str, src: &Path) -> StorageResult<u64> {
        let size = tokio::fs::metadata(src).await?.len();
        if size <= MULTIPART_CHUNK_SIZE as u64 {
            let data = tokio::fs::read(src).await?;
            self.put(key, content_type, Bytes::from(data)).await?;
            return Ok(size);
        }

        let location = location(key)?;
        let start = std::time::Instant::now();

        let options = PutMultipartOptions {
            attributes: content_type_attributes(content_type),
            ..Default::default()
        };
        let upload: ObjectResult<_> = self.store.put_multipart_opts(&location, options).await;
        let upload = upload.map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, MULTIPART_CHUNK_SIZE);

        let file = tokio::fs::File::open(src).await?;
        let mut chunks = ReaderStream::with_capacity(file, 1024 * 1024);
        let mut written: u64 = 0;

        while let Some(chunk) = chunks.next().await {
            let step = match chunk {
                Ok(chunk) => {
                    written += chunk.len() as u64;
                    let ready = writer.wait_for_capacity(MULTIPART_MAX_CONCURRENCY).await;
                    writer.put(chunk);
                    ready.map_err(|e| StorageError::UploadFailed(e.to_string()))
                }
                Err(e) => Err(StorageError::IoError(e)),
            };

            if let Err(e) = step {
                tracing::error!(
                    error = %e,
                    backend = %self.backend,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = written,
                    "Multipart upload failed, aborting"
                );
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(error = %abort_err, key = %key, "Failed to abort multipart upload");
                }
                return Err(e);
            }
        }

        let finished: ObjectResult<_> = writer.finish().await;
        finished.map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::info!(
            backend = %self.backend,
            bucket = %self.bucket,
            key = %key,
            content_type = %content_type,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object streamed from local file"
        );

        Ok(written)
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let location = location(key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object get failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object get successful"
        );

        Ok(bytes)
    }

    async fn download_to_file(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        let location = location(key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.get(&location).await;
        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = result.into_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            dest = %dest.display(),
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object streamed to local file"
        );

        Ok(written)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = location(key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let location = location(key)?;
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::SigningFailed(e.to_string()))?
            .to_string();

        Ok(url)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = location(key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object delete successful"
        );

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        self.generate_url(key)
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_public_url_defaults() {
        let storage = ObjectStorage::s3(
            "media".to_string(),
            "eu-west-1".to_string(),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            storage.public_url("videos/v1/DASH/manifest.mpd"),
            "https://media.s3.eu-west-1.amazonaws.com/videos/v1/DASH/manifest.mpd"
        );
        assert_eq!(storage.backend_type(), StorageBackend::S3);
    }

    #[test]
    fn test_s3_compatible_endpoint_uses_path_style() {
        let storage = ObjectStorage::s3(
            "media".to_string(),
            "us-east-1".to_string(),
            Some("http://localhost:9000/".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(
            storage.public_url("videos/v1/v1.mp4"),
            "http://localhost:9000/media/videos/v1/v1.mp4"
        );
    }

    #[test]
    fn test_public_base_url_override() {
        let storage = ObjectStorage::s3(
            "media".to_string(),
            "us-east-1".to_string(),
            None,
            Some("https://cdn.example.com/".to_string()),
        )
        .unwrap();
        assert_eq!(
            storage.public_url("videos/v1/HLS/playlist.m3u8"),
            "https://cdn.example.com/videos/v1/HLS/playlist.m3u8"
        );
    }
}
