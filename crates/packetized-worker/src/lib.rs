//! Packetized Worker
//!
//! Bounded job queue feeding a capped pool of transcoding workers. Jobs are
//! fire-and-forget: submitters never observe completion.

pub mod context;
pub mod queue;
pub mod recovery;

pub use context::JobHandler;
pub use queue::{JobQueueConfig, QueueError, TranscodeJobQueue};
pub use recovery::requeue_unfinished;
