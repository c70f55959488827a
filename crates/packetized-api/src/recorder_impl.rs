//! Postgres-backed `MetadataRecorder` for the transcoding pipeline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use packetized_core::{AssetId, AssetStatus, FailureReason, NewAsset, NewRepresentation};
use packetized_db::{AssetRepository, RepresentationRepository};
use packetized_processing::MetadataRecorder;

#[derive(Clone)]
pub struct PgMetadataRecorder {
    assets: AssetRepository,
    representations: RepresentationRepository,
}

impl PgMetadataRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self {
            assets: AssetRepository::new(pool.clone()),
            representations: RepresentationRepository::new(pool),
        }
    }
}

#[async_trait]
impl MetadataRecorder for PgMetadataRecorder {
    async fn record_asset(&self, asset: &NewAsset) -> Result<()> {
        self.assets
            .insert(asset)
            .await
            .with_context(|| format!("Failed to insert asset {}", asset.id))?;
        Ok(())
    }

    async fn record_representation(&self, representation: &NewRepresentation) -> Result<()> {
        self.representations
            .insert(representation)
            .await
            .with_context(|| {
                format!(
                    "Failed to insert {} representation for asset {}",
                    representation.format, representation.asset_id
                )
            })?;
        Ok(())
    }

    async fn update_asset_status(
        &self,
        id: &AssetId,
        status: AssetStatus,
        failure_reason: Option<FailureReason>,
    ) -> Result<()> {
        self.assets
            .update_status(id, status, failure_reason)
            .await
            .with_context(|| format!("Failed to set asset {} to {}", id, status))
    }

    async fn record_duration(&self, id: &AssetId, duration_seconds: f64) -> Result<()> {
        self.assets
            .set_duration(id, duration_seconds)
            .await
            .with_context(|| format!("Failed to record duration for asset {}", id))
    }
}
