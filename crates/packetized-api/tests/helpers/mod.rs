#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use packetized_api::setup::routes::app_routes;
use packetized_api::{AppState, MediaConfig, PipelineState};
use packetized_core::{
    AssetId, AssetStatus, FailureReason, NewAsset, NewRepresentation, StorageBackend,
    TranscodeJob,
};
use packetized_processing::MetadataRecorder;
use packetized_storage::{Storage, StorageError, StorageResult};
use packetized_worker::{JobHandler, JobQueueConfig, TranscodeJobQueue};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PUBLIC_BASE: &str = "https://cdn.test";

/// In-memory blob store that counts every call.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (String, Bytes)>>,
    pub calls: AtomicUsize,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
    /// Local files handed to `put_file`, in call order.
    pub put_file_sources: Mutex<Vec<PathBuf>>,
    fail_puts: AtomicBool,
    fail_signing: AtomicBool,
}

impl MemoryStorage {
    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn fail_signing(&self) {
        self.fail_signing.store(true, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<(String, Bytes)> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("injected failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (content_type.to_string(), data));
        Ok(())
    }

    async fn put_file(&self, key: &str, content_type: &str, src: &Path) -> StorageResult<u64> {
        self.put_file_sources.lock().unwrap().push(src.to_path_buf());
        let data = tokio::fs::read(src).await?;
        let size = data.len() as u64;
        self.put(key, content_type, Bytes::from(data)).await?;
        Ok(size)
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.object(key)
            .map(|(_, data)| data)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.contains(key))
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_signing.load(Ordering::SeqCst) {
            return Err(StorageError::SigningFailed("no signing key".to_string()));
        }
        Ok(format!(
            "https://signed.test/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", PUBLIC_BASE, key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[derive(Default)]
pub struct MemoryRecorder {
    pub assets: Mutex<Vec<NewAsset>>,
    fail_assets: AtomicBool,
}

impl MemoryRecorder {
    pub fn fail_assets(&self) {
        self.fail_assets.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataRecorder for MemoryRecorder {
    async fn record_asset(&self, asset: &NewAsset) -> Result<()> {
        if self.fail_assets.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset"));
        }
        self.assets.lock().unwrap().push(asset.clone());
        Ok(())
    }

    async fn record_representation(&self, _representation: &NewRepresentation) -> Result<()> {
        Ok(())
    }

    async fn update_asset_status(
        &self,
        _asset_id: &AssetId,
        _status: AssetStatus,
        _failure_reason: Option<FailureReason>,
    ) -> Result<()> {
        Ok(())
    }

    async fn record_duration(&self, _asset_id: &AssetId, _duration_seconds: f64) -> Result<()> {
        Ok(())
    }
}

/// Job handler that only remembers what it was given.
#[derive(Default)]
pub struct CapturingHandler {
    pub jobs: Mutex<Vec<TranscodeJob>>,
}

#[async_trait]
impl JobHandler for CapturingHandler {
    async fn handle(&self, job: TranscodeJob) -> Result<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<MemoryStorage>,
    pub recorder: Arc<MemoryRecorder>,
    pub handler: Arc<CapturingHandler>,
    pub spool_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_upload_limit(2048 * 1024 * 1024)
    }

    pub fn with_upload_limit(max_upload_size_bytes: usize) -> Self {
        Self::build(max_upload_size_bytes, |_, _| {})
    }

    /// Build with failure injection applied to the fakes before the server starts.
    pub fn build(
        max_upload_size_bytes: usize,
        configure: impl FnOnce(&MemoryStorage, &MemoryRecorder),
    ) -> Self {
        let storage = Arc::new(MemoryStorage::default());
        let recorder = Arc::new(MemoryRecorder::default());
        let handler = Arc::new(CapturingHandler::default());
        configure(&storage, &recorder);
        let spool_dir = tempfile::tempdir().expect("spool dir");

        let job_queue = TranscodeJobQueue::new(handler.clone(), JobQueueConfig::default());
        let state = Arc::new(AppState {
            media: MediaConfig {
                storage: storage.clone(),
                max_upload_size_bytes,
                signed_url_ttl: Duration::from_secs(3600),
                upload_spool_dir: spool_dir.path().to_path_buf(),
            },
            pipeline: PipelineState {
                recorder: recorder.clone(),
                job_queue,
            },
        });

        let server = TestServer::new(app_routes(state)).expect("test server");

        Self {
            server,
            storage,
            recorder,
            handler,
            spool_dir,
        }
    }

    /// Files left behind in the upload spool directory.
    pub fn spooled_files(&self) -> usize {
        std::fs::read_dir(self.spool_dir.path())
            .expect("read spool dir")
            .count()
    }

    /// Wait for the worker pool to pick up `expected` jobs.
    pub async fn dispatched_jobs(&self, expected: usize) -> Vec<TranscodeJob> {
        for _ in 0..200 {
            let jobs = self.handler.jobs.lock().unwrap().clone();
            if jobs.len() >= expected {
                return jobs;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {} dispatched jobs", expected);
    }
}
