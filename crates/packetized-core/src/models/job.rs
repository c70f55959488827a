use serde::{Deserialize, Serialize};

use super::asset::AssetId;

/// Message carried by the transcode queue: everything a worker needs to run one
/// asset end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub asset_id: AssetId,
    pub source_object_path: String,
    pub file_name: String,
}

impl TranscodeJob {
    pub fn new(asset_id: AssetId, source_object_path: String, file_name: String) -> Self {
        Self {
            asset_id,
            source_object_path,
            file_name,
        }
    }
}
