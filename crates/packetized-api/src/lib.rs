//! Packetized API
//!
//! HTTP surface of the transcoding service: accepts uploads, dispatches the
//! pipeline and hands out signed playback URLs. `setup` wires the application
//! together; `setup::routes::app_routes` is public so tests can drive the router
//! over fake collaborators.

pub mod api_doc;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod recorder_impl;
pub mod setup;
pub mod state;
pub mod telemetry;
pub mod utils;

pub use error::{ErrorResponse, HttpAppError};
pub use state::{AppState, MediaConfig, PipelineState};
