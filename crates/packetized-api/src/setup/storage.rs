//! Storage setup and initialization

use anyhow::{Context, Result};
use packetized_core::Config;
use packetized_storage::{create_storage, Storage};
use std::sync::Arc;

/// Build the configured blob store backend.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = create_storage(config.storage())
        .await
        .context("Failed to initialize storage backend")?;

    tracing::info!(
        backend = %storage.backend_type(),
        public_base_url = ?config.storage().resolved_public_base_url(),
        "Storage initialized"
    );

    Ok(storage)
}
