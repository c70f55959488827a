use packetized_core::{FailureReason, StreamFormat};
use packetized_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Terminal error for one transcoding job.
///
/// Every variant maps onto the `FailureReason` persisted on the asset.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source object {key} not visible after {attempts} attempts")]
    SourceNotVisible { key: String, attempts: u32 },

    #[error("failed to stage source locally: {0}")]
    StagingIo(String),

    #[error("{format} encode failed: {message}")]
    EncodeFailed {
        format: StreamFormat,
        message: String,
    },

    #[error("{format} encode timed out after {timeout:?}")]
    EncodeTimeout {
        format: StreamFormat,
        timeout: Duration,
    },

    #[error("{format} publish failed: {source}")]
    PublishFailed {
        format: StreamFormat,
        #[source]
        source: StorageError,
    },

    #[error("metadata commit failed: {0}")]
    MetadataCommitFailed(#[source] anyhow::Error),
}

impl PipelineError {
    pub fn reason(&self) -> FailureReason {
        match self {
            PipelineError::SourceNotVisible { .. } => FailureReason::SourceNotVisible,
            PipelineError::StagingIo(_) => FailureReason::StagingIoError,
            PipelineError::EncodeFailed { format, .. } => FailureReason::EncodeFailed(*format),
            PipelineError::EncodeTimeout { format, .. } => FailureReason::EncodeTimeout(*format),
            PipelineError::PublishFailed { format, .. } => FailureReason::PublishFailed(*format),
            PipelineError::MetadataCommitFailed(_) => FailureReason::MetadataCommitFailed,
        }
    }
}
