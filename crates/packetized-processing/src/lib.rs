//! Packetized Processing Library
//!
//! The transcoding pipeline for one uploaded asset: encoder invocation, duration
//! probing, local staging, publication of output trees and the orchestrator that
//! sequences them.

pub mod encoder;
pub mod error;
pub mod orchestration;
pub mod probe;
pub mod profile;
pub mod publisher;
pub mod recorder;
pub mod staging;

pub use encoder::{EncodeError, EncodeOutput, Encoder, FfmpegEncoder};
pub use error::PipelineError;
pub use orchestration::{JobOrchestrator, JobReport};
pub use probe::{DurationProbe, FfprobeProbe};
pub use profile::{EncodeProfile, DEFAULT_LADDER};
pub use publisher::{content_type_for, PublishReport, Publisher};
pub use recorder::MetadataRecorder;
pub use staging::StagingManager;
