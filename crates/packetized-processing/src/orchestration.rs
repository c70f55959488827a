//! Transcoding job orchestration: wait for source → stage → per format (encode →
//! publish → record) → delete source → mark published. Staging is cleaned on every
//! exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use packetized_core::models::file_extension;
use packetized_core::{
    AssetId, AssetStatus, NewRepresentation, PipelineConfig, StreamFormat, TranscodeJob,
};
use packetized_storage::keys::{manifest_key, representation_prefix};
use packetized_storage::{Storage, StorageError};

use crate::encoder::{EncodeError, Encoder};
use crate::error::PipelineError;
use crate::probe::DurationProbe;
use crate::profile::EncodeProfile;
use crate::publisher::Publisher;
use crate::recorder::MetadataRecorder;
use crate::staging::StagingManager;

/// Outcome of a successful job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub asset_id: AssetId,
    pub representations: Vec<NewRepresentation>,
    pub duration_seconds: Option<f64>,
}

/// Drives one asset through the pipeline. Collaborators are injected so jobs can
/// run against fakes.
pub struct JobOrchestrator {
    storage: Arc<dyn Storage>,
    encoder: Arc<dyn Encoder>,
    probe: Arc<dyn DurationProbe>,
    recorder: Arc<dyn MetadataRecorder>,
    staging: StagingManager,
    profile: EncodeProfile,
    config: PipelineConfig,
}

impl JobOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        encoder: Arc<dyn Encoder>,
        probe: Arc<dyn DurationProbe>,
        recorder: Arc<dyn MetadataRecorder>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            storage,
            encoder,
            probe,
            recorder,
            staging: StagingManager::new(config.staging_dir.clone()),
            profile: EncodeProfile::v1(),
            config,
        }
    }

    /// Run a job to a terminal asset status.
    ///
    /// The returned value is informational; the asset row is the source of truth.
    #[tracing::instrument(skip(self, job), fields(
        asset_id = %job.asset_id,
        source = %job.source_object_path,
        job.status = tracing::field::Empty,
    ))]
    pub async fn run_job(&self, job: &TranscodeJob) -> Result<JobReport, PipelineError> {
        let start = std::time::Instant::now();
        let job_dir = self.staging.job_dir(&job.asset_id);

        let result = self.execute(job).await;
        self.staging.cleanup(&job_dir).await;

        let result = match result {
            Ok(report) => self.mark_published(report).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(report) => {
                tracing::Span::current().record("job.status", "success");
                tracing::info!(
                    asset_id = %job.asset_id,
                    representations = report.representations.len(),
                    duration_ms = start.elapsed().as_millis(),
                    "Transcoding job published"
                );
            }
            Err(e) => {
                tracing::Span::current().record("job.status", "failed");
                let reason = e.reason();
                tracing::error!(
                    asset_id = %job.asset_id,
                    reason = %reason,
                    error = %e,
                    duration_ms = start.elapsed().as_millis(),
                    "Transcoding job failed"
                );
                if let Err(status_err) = self
                    .recorder
                    .update_asset_status(&job.asset_id, AssetStatus::Failed, Some(reason))
                    .await
                {
                    tracing::error!(
                        asset_id = %job.asset_id,
                        error = %status_err,
                        "Failed to record failed status"
                    );
                }
            }
        }

        result
    }

    async fn execute(&self, job: &TranscodeJob) -> Result<JobReport, PipelineError> {
        let asset_id = &job.asset_id;

        self.wait_for_source(&job.source_object_path).await?;

        let input = self
            .staging
            .materialize_local(
                self.storage.as_ref(),
                asset_id,
                &job.source_object_path,
                &file_extension(&job.file_name),
            )
            .await
            .map_err(|e| PipelineError::StagingIo(e.to_string()))?;
        self.set_status(asset_id, AssetStatus::Staged).await;

        let duration_seconds = self.probe_duration(asset_id, &input).await;

        let mut representations = Vec::with_capacity(self.config.target_formats.len());
        for format in &self.config.target_formats {
            let representation = self.process_format(asset_id, &input, *format).await?;
            representations.push(representation);
        }

        if self.config.delete_source_after_publish {
            if let Err(e) = self.storage.delete(&job.source_object_path).await {
                tracing::warn!(
                    asset_id = %asset_id,
                    key = %job.source_object_path,
                    error = %e,
                    "Failed to delete source object"
                );
            }
        }

        Ok(JobReport {
            asset_id: asset_id.clone(),
            representations,
            duration_seconds,
        })
    }

    /// Poll for the source object: `visibility_max_attempts` checks with
    /// `visibility_retry_delay` between them. Check errors count as misses.
    async fn wait_for_source(&self, key: &str) -> Result<(), PipelineError> {
        let attempts = self.config.visibility_max_attempts;

        for attempt in 1..=attempts {
            match self.storage.exists(key).await {
                Ok(true) => {
                    tracing::debug!(key = %key, attempt, "Source object visible");
                    return Ok(());
                }
                Ok(false) => {
                    tracing::debug!(key = %key, attempt, attempts, "Source object not visible yet");
                }
                Err(e) => {
                    tracing::warn!(key = %key, attempt, error = %e, "Existence check failed");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.visibility_retry_delay).await;
            }
        }

        Err(PipelineError::SourceNotVisible {
            key: key.to_string(),
            attempts,
        })
    }

    async fn probe_duration(&self, asset_id: &AssetId, input: &Path) -> Option<f64> {
        let duration = match self.probe.duration_seconds(input).await {
            Ok(duration) => duration,
            Err(e) => {
                tracing::warn!(asset_id = %asset_id, error = %e, "Duration probe failed");
                return None;
            }
        };

        if let Err(e) = self.recorder.record_duration(asset_id, duration).await {
            tracing::warn!(asset_id = %asset_id, error = %e, "Failed to record duration");
        }
        Some(duration)
    }

    /// Encode, publish and record one format. The representation row is written
    /// only after the whole tree, manifest included, is uploaded.
    #[tracing::instrument(skip(self, input), fields(asset_id = %asset_id, format = %format))]
    async fn process_format(
        &self,
        asset_id: &AssetId,
        input: &Path,
        format: StreamFormat,
    ) -> Result<NewRepresentation, PipelineError> {
        let output_dir: PathBuf = self.staging.output_dir(asset_id, format);

        self.set_status(asset_id, AssetStatus::Encoding).await;
        self.encoder
            .invoke(input, &output_dir, format, &self.profile)
            .await
            .map_err(|e| match e {
                EncodeError::Timeout(timeout) => PipelineError::EncodeTimeout { format, timeout },
                other => PipelineError::EncodeFailed {
                    format,
                    message: other.to_string(),
                },
            })?;

        self.set_status(asset_id, AssetStatus::Publishing).await;
        let prefix = representation_prefix(asset_id, format);
        let report = Publisher::new(self.storage.as_ref())
            .publish_tree(&output_dir, &prefix, format)
            .await
            .map_err(|source| PipelineError::PublishFailed { format, source })?;

        let manifest = manifest_key(asset_id, format);
        if !report.contains(&manifest) {
            return Err(PipelineError::PublishFailed {
                format,
                source: StorageError::NotFound(format!("encoder produced no {}", manifest)),
            });
        }
        self.staging.cleanup(&output_dir).await;

        let representation = NewRepresentation {
            asset_id: asset_id.clone(),
            format,
            resolution_ladder_rung: Some(
                self.profile
                    .ladder
                    .iter()
                    .map(|rung| rung.name)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            manifest_object_path: manifest,
            segment_count: i32::try_from(report.segment_count).ok(),
        };

        if let Err(e) = self.recorder.record_representation(&representation).await {
            tracing::error!(
                asset_id = %asset_id,
                format = %format,
                inconsistency = true,
                orphaned_prefix = %prefix,
                error = %e,
                "Representation published but not recorded"
            );
            return Err(PipelineError::MetadataCommitFailed(e));
        }

        tracing::info!(
            asset_id = %asset_id,
            format = %format,
            manifest = %representation.manifest_object_path,
            segments = report.segment_count,
            "Representation published"
        );

        Ok(representation)
    }

    async fn mark_published(&self, report: JobReport) -> Result<JobReport, PipelineError> {
        self.recorder
            .update_asset_status(&report.asset_id, AssetStatus::Published, None)
            .await
            .map_err(PipelineError::MetadataCommitFailed)?;
        Ok(report)
    }

    /// Intermediate status writes are progress hints; failures are logged only.
    async fn set_status(&self, asset_id: &AssetId, status: AssetStatus) {
        if let Err(e) = self.recorder.update_asset_status(asset_id, status, None).await {
            tracing::warn!(
                asset_id = %asset_id,
                status = %status,
                error = %e,
                "Failed to update asset status"
            );
        }
    }
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("staging", &self.staging)
            .field("profile", &self.profile.version)
            .field("formats", &self.config.target_formats)
            .finish()
    }
}

