//! Shared key generation for the blob store.
//!
//! Every object that belongs to an asset lives under `videos/{asset_id}/`.

use packetized_core::{AssetId, StreamFormat};

use crate::traits::{StorageError, StorageResult};

pub const ROOT_PREFIX: &str = "videos";

/// Key of the raw upload: `videos/{id}/{id}{ext}`.
pub fn source_key(asset_id: &AssetId, extension: &str) -> String {
    format!("{}/{}/{}{}", ROOT_PREFIX, asset_id, asset_id, extension)
}

/// Prefix every artifact of one representation is published under: `videos/{id}/{FORMAT}`.
pub fn representation_prefix(asset_id: &AssetId, format: StreamFormat) -> String {
    format!("{}/{}/{}", ROOT_PREFIX, asset_id, format)
}

/// Key of one published artifact. `relative_path` uses `/` separators on every platform.
pub fn artifact_key(prefix: &str, relative_path: &str) -> String {
    let relative = relative_path.replace('\\', "/");
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Key of the manifest a player fetches first for `format`.
pub fn manifest_key(asset_id: &AssetId, format: StreamFormat) -> String {
    artifact_key(
        &representation_prefix(asset_id, format),
        format.manifest_name(),
    )
}

/// Reject keys that could escape the bucket root or a local base directory.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
