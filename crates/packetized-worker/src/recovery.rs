//! Startup recovery for jobs lost when the previous process stopped.
//!
//! Nothing persists the channel, so an asset that was queued or mid-run at shutdown
//! is left in a non-terminal status. Re-dispatching it from the source object runs
//! it to `Published` or `Failed` like any other job.

use packetized_core::{Asset, TranscodeJob};

use crate::queue::{QueueError, TranscodeJobQueue};

/// Re-dispatch every non-terminal asset in `assets`, returning how many were queued.
///
/// Waits for channel room rather than dropping jobs; fails only if the queue is closed.
pub async fn requeue_unfinished<I>(queue: &TranscodeJobQueue, assets: I) -> Result<usize, QueueError>
where
    I: IntoIterator<Item = Asset>,
{
    let mut requeued = 0usize;

    for asset in assets {
        if asset.status.is_terminal() {
            continue;
        }

        tracing::warn!(
            asset_id = %asset.id,
            status = %asset.status,
            source = %asset.source_object_path,
            "Re-dispatching unfinished transcoding job"
        );

        let job = TranscodeJob::new(asset.id, asset.source_object_path, asset.original_file_name);
        queue.submit_async(job).await?;
        requeued += 1;
    }

    if requeued > 0 {
        tracing::info!(requeued, "Unfinished transcoding jobs re-dispatched");
    }

    Ok(requeued)
}
