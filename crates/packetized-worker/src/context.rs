//! Job handler trait
//!
//! The worker pool hands every dequeued job to a `JobHandler`. In the service the
//! handler is the pipeline orchestrator; tests plug in their own.

use anyhow::Result;
use async_trait::async_trait;

use packetized_core::TranscodeJob;
use packetized_processing::JobOrchestrator;

#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run one job to completion. Errors are logged by the pool, never retried.
    async fn handle(&self, job: TranscodeJob) -> Result<()>;
}

#[async_trait]
impl JobHandler for JobOrchestrator {
    async fn handle(&self, job: TranscodeJob) -> Result<()> {
        self.run_job(&job).await?;
        Ok(())
    }
}
