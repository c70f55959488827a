//! Per-job local working directories.
//!
//! Layout under the staging root:
//!
//! ```text
//! {root}/{asset_id}/input{ext}
//! {root}/{asset_id}/out/HLS/...
//! {root}/{asset_id}/out/DASH/...
//! ```

use packetized_core::{AssetId, StreamFormat};
use packetized_storage::{Storage, StorageError};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StagingManager {
    root: PathBuf,
}

impl StagingManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn job_dir(&self, asset_id: &AssetId) -> PathBuf {
        self.root.join(asset_id.as_str())
    }

    pub fn output_dir(&self, asset_id: &AssetId, format: StreamFormat) -> PathBuf {
        self.job_dir(asset_id).join("out").join(format.as_str())
    }

    /// Download `source_key` into a fresh job directory and return the local path.
    ///
    /// Any leftover directory from an earlier attempt is removed first.
    #[tracing::instrument(skip(self, storage), fields(asset_id = %asset_id))]
    pub async fn materialize_local(
        &self,
        storage: &dyn Storage,
        asset_id: &AssetId,
        source_key: &str,
        extension: &str,
    ) -> Result<PathBuf, StorageError> {
        let job_dir = self.job_dir(asset_id);
        if tokio::fs::try_exists(&job_dir).await? {
            tokio::fs::remove_dir_all(&job_dir).await?;
        }
        tokio::fs::create_dir_all(&job_dir).await?;

        let input = job_dir.join(format!("input{}", extension));
        let bytes = storage.download_to_file(source_key, &input).await?;

        tracing::info!(
            key = %source_key,
            path = %input.display(),
            bytes,
            "Staged source locally"
        );

        Ok(input)
    }

    /// Best-effort recursive delete of a directory under the staging root.
    ///
    /// Never fails. Missing directories are ignored and paths outside the root are
    /// refused.
    pub async fn cleanup(&self, dir: &Path) {
        if !self.is_within_root(dir) {
            tracing::error!(
                path = %dir.display(),
                root = %self.root.display(),
                "Refusing to clean up path outside staging root"
            );
            return;
        }

        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => tracing::debug!(path = %dir.display(), "Removed staging directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to remove staging directory"
            ),
        }
    }

    fn is_within_root(&self, dir: &Path) -> bool {
        use std::path::Component;

        if dir.components().any(|c| matches!(c, Component::ParentDir)) {
            return false;
        }
        dir != self.root && dir.starts_with(&self.root)
    }
}
