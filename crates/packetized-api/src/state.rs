use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use packetized_processing::MetadataRecorder;
use packetized_storage::Storage;
use packetized_worker::TranscodeJobQueue;

/// Blob store access and request limits for the upload and stream handlers.
#[derive(Clone)]
pub struct MediaConfig {
    pub storage: Arc<dyn Storage>,
    pub max_upload_size_bytes: usize,
    pub signed_url_ttl: Duration,
    /// Uploads are spooled here before being handed to the blob store.
    pub upload_spool_dir: PathBuf,
}

/// Handles into the transcoding pipeline.
#[derive(Clone)]
pub struct PipelineState {
    pub recorder: Arc<dyn MetadataRecorder>,
    pub job_queue: TranscodeJobQueue,
}

pub struct AppState {
    pub media: MediaConfig,
    pub pipeline: PipelineState,
}
