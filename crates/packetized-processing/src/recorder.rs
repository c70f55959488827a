use anyhow::Result;
use async_trait::async_trait;
use packetized_core::{AssetId, AssetStatus, FailureReason, NewAsset, NewRepresentation};

/// Write side of the metadata store used by the upload path and the pipeline.
///
/// `record_representation` must only be called once the representation's manifest
/// object is confirmed uploaded.
#[async_trait]
pub trait MetadataRecorder: Send + Sync {
    async fn record_asset(&self, asset: &NewAsset) -> Result<()>;

    async fn record_representation(&self, representation: &NewRepresentation) -> Result<()>;

    async fn update_asset_status(
        &self,
        asset_id: &AssetId,
        status: AssetStatus,
        failure_reason: Option<FailureReason>,
    ) -> Result<()>;

    async fn record_duration(&self, asset_id: &AssetId, duration_seconds: f64) -> Result<()>;
}
