use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use packetized_core::models::file_extension;
use packetized_core::{AppError, AssetId, NewAsset, StreamFormat, TranscodeJob};
use packetized_processing::content_type_for;
use packetized_storage::keys::{manifest_key, source_key};
use serde::Serialize;
use utoipa::ToSchema;

use crate::constants::UPLOAD_SUCCESS_MESSAGE;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::utils::upload::{extract_multipart_file, UploadedFile};

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub video_id: String,
    /// Predicted DASH manifest URL. The object exists only once the pipeline
    /// has published it.
    pub video_url: String,
}

/// Store the raw upload, record the asset and dispatch its transcoding job.
///
/// Returns as soon as the job is queued; pipeline failures never reach this
/// response.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "videos",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded and queued for transcoding", body = UploadResponse),
        (status = 400, description = "No file uploaded", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 503, description = "Transcode queue unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(asset_id = tracing::field::Empty))]
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let file = extract_multipart_file(
        multipart,
        state.media.max_upload_size_bytes,
        &state.media.upload_spool_dir,
    )
    .await?;

    let asset_id = AssetId::generate();
    tracing::Span::current().record("asset_id", tracing::field::display(&asset_id));

    let storage_key = source_key(&asset_id, &file_extension(&file.file_name));
    let content_type = match content_type_for(Path::new(&file.file_name)) {
        "application/octet-stream" => file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        known => known.to_string(),
    };
    let stored = state
        .media
        .storage
        .put_file(&storage_key, &content_type, &file.spool)
        .await?;

    tracing::info!(
        asset_id = %asset_id,
        storage_key = %storage_key,
        file_size = file.size,
        stored_bytes = stored,
        content_type = %content_type,
        "Raw upload stored"
    );

    let UploadedFile {
        spool, file_name, ..
    } = file;
    if let Err(e) = spool.close() {
        tracing::warn!(error = %e, "Failed to remove upload spool file");
    }

    let asset = NewAsset::new(asset_id.clone(), &file_name, storage_key.clone());
    if let Err(e) = state.pipeline.recorder.record_asset(&asset).await {
        let storage = state.media.storage.clone();
        let key = storage_key.clone();
        tokio::spawn(async move {
            if let Err(cleanup_err) = storage.delete(&key).await {
                tracing::debug!(
                    error = %cleanup_err,
                    storage_key = %key,
                    "Failed to cleanup storage file after DB error"
                );
            }
        });
        return Err(AppError::InternalWithSource {
            message: "Failed to record uploaded asset".to_string(),
            source: e,
        }
        .into());
    }

    let job = TranscodeJob::new(asset_id.clone(), storage_key, file_name);
    if let Err(e) = state.pipeline.job_queue.submit_async(job).await {
        tracing::error!(asset_id = %asset_id, error = %e, "Failed to dispatch transcoding job");
        return Err(e.into());
    }

    Ok(Json(UploadResponse {
        message: UPLOAD_SUCCESS_MESSAGE.to_string(),
        video_id: asset_id.to_string(),
        video_url: state
            .media
            .storage
            .public_url(&manifest_key(&asset_id, StreamFormat::Dash)),
    }))
}
