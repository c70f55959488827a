use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::AssetId;
use super::format::StreamFormat;

/// One published streaming rendition of an asset. Rows are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Representation {
    pub id: Uuid,
    pub asset_id: AssetId,
    pub format: StreamFormat,
    pub resolution_ladder_rung: Option<String>,
    pub manifest_object_path: String,
    pub segment_count: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload, built only after the manifest object is confirmed uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRepresentation {
    pub asset_id: AssetId,
    pub format: StreamFormat,
    pub resolution_ladder_rung: Option<String>,
    pub manifest_object_path: String,
    pub segment_count: Option<i32>,
}
