use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use packetized_core::{AppError, AssetId, StreamFormat};
use packetized_storage::keys::manifest_key;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StreamQuery {
    /// `DASH` or `HLS`
    pub format: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StreamResponse {
    pub signed_url: String,
}

/// Accepts exactly `DASH` or `HLS`.
fn parse_format(format: Option<&str>) -> Result<StreamFormat, AppError> {
    format
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| AppError::BadRequest("Invalid format. Use 'DASH' or 'HLS'.".to_string()))
}

/// Sign the expected manifest of `video_id` for playback.
///
/// The manifest is not checked for existence: an asset that is still encoding,
/// or that failed, yields a URL to an object that may never appear.
#[utoipa::path(
    get,
    path = "/stream/{video_id}",
    tag = "videos",
    params(
        ("video_id" = String, Path, description = "Asset ID returned by the upload"),
        StreamQuery
    ),
    responses(
        (status = 200, description = "Signed manifest URL", body = StreamResponse),
        (status = 400, description = "Invalid format or video ID", body = ErrorResponse),
        (status = 500, description = "Failed to generate signed URL", body = ErrorResponse)
    )
)]
pub async fn stream_video(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<Json<StreamResponse>, HttpAppError> {
    let format = parse_format(query.format.as_deref())?;
    let asset_id: AssetId = video_id
        .parse()
        .map_err(|e: anyhow::Error| AppError::BadRequest(e.to_string()))?;

    let key = manifest_key(&asset_id, format);
    let signed_url = state
        .media
        .storage
        .signed_url(&key, state.media.signed_url_ttl)
        .await
        .map_err(|e| AppError::Signing(e.to_string()))?;

    tracing::debug!(asset_id = %asset_id, format = %format, key = %key, "Signed manifest URL");

    Ok(Json(StreamResponse { signed_url }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format_accepts_exact_names() {
        assert_eq!(parse_format(Some("DASH")).unwrap(), StreamFormat::Dash);
        assert_eq!(parse_format(Some("HLS")).unwrap(), StreamFormat::Hls);
    }

    #[test]
    fn test_parse_format_rejects_everything_else() {
        for value in [Some("XML"), Some("dash"), Some(""), None] {
            let err = parse_format(value).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{:?}", value);
        }
    }
}
