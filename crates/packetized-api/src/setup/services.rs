//! Wiring of the recorder, pipeline and job queue into `AppState`

use anyhow::{Context, Result};
use packetized_core::Config;
use packetized_db::AssetRepository;
use packetized_processing::{FfmpegEncoder, FfprobeProbe, JobOrchestrator, MetadataRecorder};
use packetized_storage::Storage;
use packetized_worker::{requeue_unfinished, JobQueueConfig, TranscodeJobQueue};
use sqlx::PgPool;
use std::sync::Arc;

use crate::recorder_impl::PgMetadataRecorder;
use crate::state::{AppState, MediaConfig, PipelineState};

pub async fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let pipeline = config.pipeline();

    tokio::fs::create_dir_all(&pipeline.staging_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create staging directory {}",
                pipeline.staging_dir.display()
            )
        })?;

    let recorder: Arc<dyn MetadataRecorder> = Arc::new(PgMetadataRecorder::new(pool.clone()));
    let encoder = FfmpegEncoder::new(pipeline.ffmpeg_path.clone(), pipeline.encode_timeout)
        .context("Failed to configure encoder")?;
    let probe = FfprobeProbe::new(pipeline.ffprobe_path.clone(), pipeline.probe_timeout)?;

    let orchestrator = JobOrchestrator::new(
        storage.clone(),
        Arc::new(encoder),
        Arc::new(probe),
        recorder.clone(),
        pipeline.clone(),
    );
    tracing::info!(
        ffmpeg_path = %pipeline.ffmpeg_path,
        staging_dir = %pipeline.staging_dir.display(),
        formats = ?pipeline.target_formats,
        "Transcoding pipeline configured"
    );

    let job_queue = TranscodeJobQueue::new(
        Arc::new(orchestrator),
        JobQueueConfig {
            queue_size: config.job_queue_size(),
            max_concurrent: config.max_concurrent_jobs(),
        },
    );

    let unfinished = AssetRepository::new(pool)
        .list_unfinished()
        .await
        .context("Failed to load unfinished assets")?;
    requeue_unfinished(&job_queue, unfinished)
        .await
        .context("Failed to re-dispatch unfinished assets")?;

    Ok(Arc::new(AppState {
        media: MediaConfig {
            storage,
            max_upload_size_bytes: config.max_upload_size_bytes(),
            signed_url_ttl: config.signed_url_ttl(),
            upload_spool_dir: pipeline.staging_dir.clone(),
        },
        pipeline: PipelineState {
            recorder,
            job_queue,
        },
    }))
}
