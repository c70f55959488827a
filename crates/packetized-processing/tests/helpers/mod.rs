//! In-memory collaborators for pipeline tests.

#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use packetized_core::{
    AssetId, AssetStatus, FailureReason, NewAsset, NewRepresentation, PipelineConfig,
    StreamFormat,
};
use packetized_processing::{
    DurationProbe, EncodeError, EncodeOutput, EncodeProfile, Encoder, JobOrchestrator,
    MetadataRecorder,
};
use packetized_storage::{Storage, StorageBackend, StorageError, StorageResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Blob store kept in a map, with call counters and failure injection.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (String, Bytes)>>,
    /// Number of `exists` calls that report "not visible" before the truth is returned.
    hidden_checks: AtomicUsize,
    never_visible: AtomicBool,
    fail_gets: AtomicBool,
    fail_put_containing: Mutex<Option<String>>,
    pub exists_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub put_calls: AtomicUsize,
    pub sign_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: &str, content_type: &str, data: &'static [u8]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            (content_type.to_string(), Bytes::from_static(data)),
        );
    }

    pub fn hide_for_checks(&self, checks: usize) {
        self.hidden_checks.store(checks, Ordering::SeqCst);
    }

    pub fn never_visible(&self) {
        self.never_visible.store(true, Ordering::SeqCst);
    }

    pub fn fail_gets(&self) {
        self.fail_gets.store(true, Ordering::SeqCst);
    }

    pub fn fail_puts_containing(&self, needle: &str) {
        *self.fail_put_containing.lock().unwrap() = Some(needle.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(content_type, _)| content_type.clone())
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<_> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn total_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
            + self.get_calls.load(Ordering::SeqCst)
            + self.put_calls.load(Ordering::SeqCst)
            + self.sign_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = self.fail_put_containing.lock().unwrap().as_deref() {
            if key.contains(needle) {
                return Err(StorageError::UploadFailed(format!("injected failure for {}", key)));
            }
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (content_type.to_string(), data));
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StorageError::DownloadFailed(format!("connection reset reading {}", key)));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.never_visible.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let hidden = self.hidden_checks.load(Ordering::SeqCst);
        if hidden > 0 {
            self.hidden_checks.store(hidden - 1, Ordering::SeqCst);
            return Ok(false);
        }
        Ok(self.contains(key))
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://blob.test/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://blob.test/{}", key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FakeFailure {
    Exit,
    Timeout,
    /// Exit successfully without writing a manifest.
    NoManifest,
}

/// Encoder that writes a small but realistic output tree for each format.
#[derive(Default)]
pub struct FakeEncoder {
    failures: Mutex<Vec<(StreamFormat, FakeFailure)>>,
    pub invocations: Mutex<Vec<(StreamFormat, PathBuf)>>,
}

impl FakeEncoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, format: StreamFormat, failure: FakeFailure) {
        self.failures.lock().unwrap().push((format, failure));
    }

    pub fn invoked_formats(&self) -> Vec<StreamFormat> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|(format, _)| *format)
            .collect()
    }

    fn failure_for(&self, format: StreamFormat) -> Option<FakeFailure> {
        self.failures
            .lock()
            .unwrap()
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, failure)| *failure)
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn invoke(
        &self,
        input: &Path,
        output_dir: &Path,
        format: StreamFormat,
        profile: &EncodeProfile,
    ) -> Result<EncodeOutput, EncodeError> {
        self.invocations
            .lock()
            .unwrap()
            .push((format, input.to_path_buf()));
        assert!(input.is_file(), "encoder input must be staged locally");

        let failure = self.failure_for(format);
        match failure {
            Some(FakeFailure::Exit) => {
                return Err(EncodeError::Io(std::io::Error::other(
                    "Invalid data found when processing input",
                )))
            }
            Some(FakeFailure::Timeout) => return Err(EncodeError::Timeout(Duration::from_secs(1))),
            _ => {}
        }

        tokio::fs::create_dir_all(output_dir).await?;
        let write_manifest = !matches!(failure, Some(FakeFailure::NoManifest));

        match format {
            StreamFormat::Hls => {
                for rung in &profile.ladder {
                    let dir = output_dir.join(EncodeProfile::hls_variant_dir(rung));
                    tokio::fs::create_dir_all(&dir).await?;
                    tokio::fs::write(dir.join("index.m3u8"), b"#EXTM3U\n").await?;
                    for segment in 0..3 {
                        tokio::fs::write(dir.join(format!("segment_{:03}.ts", segment)), b"ts")
                            .await?;
                    }
                }
                if write_manifest {
                    tokio::fs::write(output_dir.join("playlist.m3u8"), b"#EXTM3U\n").await?;
                }
            }
            StreamFormat::Dash => {
                for stream in 0..=profile.ladder.len() {
                    tokio::fs::write(output_dir.join(format!("init-stream{}.m4s", stream)), b"init")
                        .await?;
                    for chunk in 1..=2 {
                        tokio::fs::write(
                            output_dir.join(format!("chunk-stream{}-{:05}.m4s", stream, chunk)),
                            b"m4s",
                        )
                        .await?;
                    }
                }
                if write_manifest {
                    tokio::fs::write(output_dir.join("manifest.mpd"), b"<MPD/>").await?;
                }
            }
        }

        Ok(EncodeOutput::default())
    }
}

pub struct FixedProbe(pub Option<f64>);

#[async_trait]
impl DurationProbe for FixedProbe {
    async fn duration_seconds(&self, _input: &Path) -> anyhow::Result<f64> {
        self.0.ok_or_else(|| anyhow!("ffprobe failed"))
    }
}

/// Recorder that keeps every write in memory.
#[derive(Default)]
pub struct MemoryRecorder {
    pub assets: Mutex<Vec<NewAsset>>,
    pub representations: Mutex<Vec<NewRepresentation>>,
    pub statuses: Mutex<Vec<(AssetId, AssetStatus, Option<FailureReason>)>>,
    pub durations: Mutex<Vec<(AssetId, f64)>>,
    fail_representations: AtomicBool,
}

impl MemoryRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_representations(&self) {
        self.fail_representations.store(true, Ordering::SeqCst);
    }

    pub fn final_status(&self) -> Option<(AssetStatus, Option<FailureReason>)> {
        self.statuses
            .lock()
            .unwrap()
            .last()
            .map(|(_, status, reason)| (*status, *reason))
    }

    pub fn representation_formats(&self) -> Vec<StreamFormat> {
        self.representations
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.format)
            .collect()
    }
}

#[async_trait]
impl MetadataRecorder for MemoryRecorder {
    async fn record_asset(&self, asset: &NewAsset) -> anyhow::Result<()> {
        self.assets.lock().unwrap().push(asset.clone());
        Ok(())
    }

    async fn record_representation(&self, representation: &NewRepresentation) -> anyhow::Result<()> {
        if self.fail_representations.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset by peer"));
        }
        self.representations
            .lock()
            .unwrap()
            .push(representation.clone());
        Ok(())
    }

    async fn update_asset_status(
        &self,
        asset_id: &AssetId,
        status: AssetStatus,
        failure_reason: Option<FailureReason>,
    ) -> anyhow::Result<()> {
        self.statuses
            .lock()
            .unwrap()
            .push((asset_id.clone(), status, failure_reason));
        Ok(())
    }

    async fn record_duration(&self, asset_id: &AssetId, duration_seconds: f64) -> anyhow::Result<()> {
        self.durations
            .lock()
            .unwrap()
            .push((asset_id.clone(), duration_seconds));
        Ok(())
    }
}

pub struct Harness {
    pub storage: Arc<MemoryStorage>,
    pub encoder: Arc<FakeEncoder>,
    pub recorder: Arc<MemoryRecorder>,
    pub staging_root: tempfile::TempDir,
    pub config: PipelineConfig,
}

impl Harness {
    pub fn new() -> Self {
        let staging_root = tempfile::tempdir().expect("Failed to create staging dir");
        let config = PipelineConfig {
            staging_dir: staging_root.path().join("staging"),
            visibility_max_attempts: 5,
            visibility_retry_delay: Duration::from_millis(10),
            ..PipelineConfig::default()
        };

        Self {
            storage: MemoryStorage::new(),
            encoder: FakeEncoder::new(),
            recorder: MemoryRecorder::new(),
            staging_root,
            config,
        }
    }

    pub fn orchestrator(&self) -> JobOrchestrator {
        self.orchestrator_with_probe(FixedProbe(Some(10.0)))
    }

    pub fn orchestrator_with_probe(&self, probe: FixedProbe) -> JobOrchestrator {
        JobOrchestrator::new(
            self.storage.clone(),
            self.encoder.clone(),
            Arc::new(probe),
            self.recorder.clone(),
            self.config.clone(),
        )
    }
}
