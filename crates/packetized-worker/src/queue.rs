//! Transcode job queue: bounded channel, capped worker pool, submission.
//!
//! Shutdown: [`TranscodeJobQueue::shutdown`] stops the pool from taking new jobs; it
//! does not wait for in-flight jobs, which run to their terminal status.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};

use packetized_core::TranscodeJob;

use crate::context::JobHandler;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Transcode queue is full, please try again later")]
    Full,

    #[error("Transcode queue is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct JobQueueConfig {
    /// Capacity of the bounded channel.
    pub queue_size: usize,
    /// Jobs allowed to run at once.
    pub max_concurrent: usize,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            queue_size: 1000,
            max_concurrent: 2,
        }
    }
}

#[derive(Clone)]
pub struct TranscodeJobQueue {
    tx: mpsc::Sender<TranscodeJob>,
    shutdown_tx: mpsc::Sender<()>,
}

impl TranscodeJobQueue {
    /// Create the queue and spawn its worker pool on the current runtime.
    pub fn new(handler: Arc<dyn JobHandler>, config: JobQueueConfig) -> Self {
        let queue_size = config.queue_size.max(1);
        let max_concurrent = config.max_concurrent.max(1);

        let (tx, rx) = mpsc::channel(queue_size);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            Self::worker_pool(rx, shutdown_rx, handler, max_concurrent).await;
        });

        tracing::info!(
            queue_size = queue_size,
            max_concurrent = max_concurrent,
            "Transcode job queue initialized with bounded channel"
        );

        Self { tx, shutdown_tx }
    }

    /// Enqueue without waiting. Fails with `QueueError::Full` when the channel is at
    /// capacity.
    #[tracing::instrument(skip(self, job), fields(job.type = "transcode", asset_id = %job.asset_id))]
    pub fn submit(&self, job: TranscodeJob) -> Result<(), QueueError> {
        tracing::info!("Enqueuing transcode job");
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => {
                tracing::warn!("Transcode job queue is full, rejecting job");
                QueueError::Full
            }
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Enqueue, waiting for room if the channel is full.
    #[tracing::instrument(skip(self, job), fields(job.type = "transcode", asset_id = %job.asset_id))]
    pub async fn submit_async(&self, job: TranscodeJob) -> Result<(), QueueError> {
        tracing::info!("Enqueuing transcode job (async)");
        self.tx.send(job).await.map_err(|_| QueueError::Closed)
    }

    /// True once the worker pool has stopped and submissions fail with `Closed`.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Signal the worker pool to stop taking jobs. Returns immediately.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating transcode queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }

    async fn worker_pool(
        mut rx: mpsc::Receiver<TranscodeJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
        handler: Arc<dyn JobHandler>,
        max_concurrent: usize,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        tracing::info!(max_concurrent, "Transcode worker pool started");

        loop {
            // Permit first: jobs waiting for a worker stay in the channel.
            let permit = tokio::select! {
                _ = shutdown_rx.recv() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job = tokio::select! {
                _ = shutdown_rx.recv() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let handler = handler.clone();
            tokio::spawn(async move {
                let _permit = permit;
                Self::process_job(job, handler).await;
            });
        }

        tracing::info!("Transcode worker pool stopped");
    }

    #[tracing::instrument(skip(job, handler), fields(
        job.type = "transcode",
        asset_id = %job.asset_id,
        job.status = tracing::field::Empty,
    ))]
    async fn process_job(job: TranscodeJob, handler: Arc<dyn JobHandler>) {
        let start = std::time::Instant::now();
        let asset_id = job.asset_id.clone();
        tracing::info!(asset_id = %asset_id, "Starting transcode job");

        match handler.handle(job).await {
            Ok(()) => {
                tracing::Span::current().record("job.status", "success");
                tracing::info!(
                    asset_id = %asset_id,
                    duration_ms = start.elapsed().as_millis(),
                    "Transcode job completed"
                );
            }
            Err(e) => {
                tracing::Span::current().record("job.status", "failed");
                tracing::error!(
                    asset_id = %asset_id,
                    error = %e,
                    duration_ms = start.elapsed().as_millis(),
                    "Transcode job failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use packetized_core::AssetId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn job(id: &str) -> TranscodeJob {
        TranscodeJob::new(
            AssetId::parse(id).unwrap(),
            format!("videos/{id}/{id}.mp4"),
            "clip.mp4".to_string(),
        )
    }

    #[derive(Default)]
    struct CountingHandler {
        running: AtomicUsize,
        peak: AtomicUsize,
        finished: AtomicUsize,
        release: Notify,
        block: bool,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, job: TranscodeJob) -> anyhow::Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if self.block {
                self.release.notified().await;
            } else {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }

            self.running.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            if job.asset_id.as_str() == "bad" {
                return Err(anyhow!("encode failed"));
            }
            Ok(())
        }
    }

    async fn wait_for(counter: &AtomicUsize, expected: usize) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {} jobs", expected);
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let handler = Arc::new(CountingHandler::default());
        let queue = TranscodeJobQueue::new(
            handler.clone(),
            JobQueueConfig {
                queue_size: 16,
                max_concurrent: 2,
            },
        );

        for i in 0..6 {
            queue.submit(job(&format!("v{i}"))).unwrap();
        }
        queue.submit(job("bad")).unwrap();

        wait_for(&handler.finished, 7).await;
        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(handler.running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_submit() {
        let handler = Arc::new(CountingHandler {
            block: true,
            ..Default::default()
        });
        let queue = TranscodeJobQueue::new(
            handler.clone(),
            JobQueueConfig {
                queue_size: 1,
                max_concurrent: 1,
            },
        );

        queue.submit(job("v1")).unwrap();
        wait_for(&handler.running, 1).await;

        // The single worker is busy, so the next job waits in the channel.
        queue.submit(job("v2")).unwrap();
        assert!(matches!(queue.submit(job("v3")), Err(QueueError::Full)));

        handler.release.notify_waiters();
        wait_for(&handler.finished, 1).await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_closed() {
        let handler = Arc::new(CountingHandler::default());
        let queue = TranscodeJobQueue::new(handler, JobQueueConfig::default());

        queue.shutdown().await;
        for _ in 0..100 {
            if queue.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(matches!(queue.submit(job("v1")), Err(QueueError::Closed)));
        assert!(matches!(
            queue.submit_async(job("v2")).await,
            Err(QueueError::Closed)
        ));
    }
}
