use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::format::StreamFormat;

/// Opaque asset identifier.
///
/// Freshly ingested assets get a UUID v4 string. The id is used verbatim as an
/// object-path segment, so only ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub const MAX_LEN: usize = 64;

    /// Generate a new random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate and wrap an externally supplied id.
    pub fn parse(value: &str) -> Result<Self, anyhow::Error> {
        if value.is_empty() || value.len() > Self::MAX_LEN {
            return Err(anyhow::anyhow!(
                "Asset id must be between 1 and {} characters",
                Self::MAX_LEN
            ));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(anyhow::anyhow!("Asset id contains invalid characters"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Pipeline status of an asset. `Published` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "asset_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Ingested,
    Staged,
    Encoding,
    Publishing,
    Published,
    Failed,
}

impl AssetStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetStatus::Published | AssetStatus::Failed)
    }
}

impl Display for AssetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetStatus::Ingested => write!(f, "ingested"),
            AssetStatus::Staged => write!(f, "staged"),
            AssetStatus::Encoding => write!(f, "encoding"),
            AssetStatus::Publishing => write!(f, "publishing"),
            AssetStatus::Published => write!(f, "published"),
            AssetStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why an asset ended up `Failed`.
///
/// Persisted as its `Display` string (`EncodeFailed:DASH`), which round-trips
/// through `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FailureReason {
    SourceNotVisible,
    StagingIoError,
    EncodeFailed(StreamFormat),
    EncodeTimeout(StreamFormat),
    PublishFailed(StreamFormat),
    MetadataCommitFailed,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FailureReason::SourceNotVisible => write!(f, "SourceNotVisible"),
            FailureReason::StagingIoError => write!(f, "StagingIOError"),
            FailureReason::EncodeFailed(format) => write!(f, "EncodeFailed:{}", format),
            FailureReason::EncodeTimeout(format) => write!(f, "EncodeTimeout:{}", format),
            FailureReason::PublishFailed(format) => write!(f, "PublishFailed:{}", format),
            FailureReason::MetadataCommitFailed => write!(f, "MetadataCommitFailed"),
        }
    }
}

impl FromStr for FailureReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None => match s {
                "SourceNotVisible" => Ok(FailureReason::SourceNotVisible),
                "StagingIOError" => Ok(FailureReason::StagingIoError),
                "MetadataCommitFailed" => Ok(FailureReason::MetadataCommitFailed),
                _ => Err(anyhow::anyhow!("Unknown failure reason: {}", s)),
            },
            Some((kind, format)) => {
                let format: StreamFormat = format.parse()?;
                match kind {
                    "EncodeFailed" => Ok(FailureReason::EncodeFailed(format)),
                    "EncodeTimeout" => Ok(FailureReason::EncodeTimeout(format)),
                    "PublishFailed" => Ok(FailureReason::PublishFailed(format)),
                    _ => Err(anyhow::anyhow!("Unknown failure reason: {}", s)),
                }
            }
        }
    }
}

impl From<FailureReason> for String {
    fn from(reason: FailureReason) -> Self {
        reason.to_string()
    }
}

impl TryFrom<String> for FailureReason {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One uploaded media item tracked through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub original_file_name: String,
    pub extension: String,
    pub source_object_path: String,
    pub status: AssetStatus,
    pub failure_reason: Option<FailureReason>,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for an asset accepted at upload time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    pub id: AssetId,
    pub original_file_name: String,
    pub extension: String,
    pub source_object_path: String,
}

impl NewAsset {
    /// Split `file_name` into its lower-cased extension (with leading dot, may be empty).
    pub fn new(id: AssetId, original_file_name: &str, source_object_path: String) -> Self {
        Self {
            id,
            original_file_name: original_file_name.to_string(),
            extension: file_extension(original_file_name),
            source_object_path,
        }
    }
}

/// Lower-cased extension including the leading dot, or an empty string.
pub fn file_extension(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_rejects_path_segments() {
        assert!(AssetId::parse("v1").is_ok());
        assert!(AssetId::parse("../etc").is_err());
        assert!(AssetId::parse("a/b").is_err());
        assert!(AssetId::parse("").is_err());
        assert!(AssetId::parse(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_generated_asset_id_is_valid() {
        let id = AssetId::generate();
        assert!(AssetId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_asset_status_terminal() {
        assert!(AssetStatus::Published.is_terminal());
        assert!(AssetStatus::Failed.is_terminal());
        assert!(!AssetStatus::Encoding.is_terminal());
        assert_eq!(AssetStatus::Publishing.to_string(), "publishing");
    }

    #[test]
    fn test_failure_reason_strings() {
        assert_eq!(FailureReason::StagingIoError.to_string(), "StagingIOError");
        assert_eq!(
            FailureReason::EncodeTimeout(StreamFormat::Dash).to_string(),
            "EncodeTimeout:DASH"
        );
        assert_eq!(
            "PublishFailed:HLS".parse::<FailureReason>().unwrap(),
            FailureReason::PublishFailed(StreamFormat::Hls)
        );
        assert!("EncodeFailed:XML".parse::<FailureReason>().is_err());
        assert!("Exploded".parse::<FailureReason>().is_err());
    }

    #[test]
    fn test_failure_reason_serializes_as_string() {
        let json = serde_json::to_string(&FailureReason::EncodeFailed(StreamFormat::Hls)).unwrap();
        assert_eq!(json, "\"EncodeFailed:HLS\"");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("Clip.MP4"), ".mp4");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("noext"), "");
    }
}
