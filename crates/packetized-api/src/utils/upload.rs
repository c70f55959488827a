//! Multipart helpers for the upload handler

use std::path::Path;

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use packetized_core::AppError;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::constants::{DEFAULT_FILE_NAME, UPLOAD_FIELD_NAME};

/// The single file part of an upload request, spooled to disk.
///
/// The spool file is removed when this value is dropped.
#[derive(Debug)]
pub struct UploadedFile {
    pub spool: TempPath,
    pub size: u64,
    pub file_name: String,
    pub content_type: Option<String>,
}

/// Stream the `file` field into a temporary file under `spool_dir`, enforcing
/// `max_size` as chunks arrive. Other fields are ignored.
pub async fn extract_multipart_file(
    mut multipart: Multipart,
    max_size: usize,
    spool_dir: &Path,
) -> Result<UploadedFile, AppError> {
    let mut uploaded: Option<UploadedFile> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        if uploaded.is_some() {
            return Err(AppError::BadRequest(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }

        let file_name = sanitize_filename(field.file_name().unwrap_or(DEFAULT_FILE_NAME))?;
        let content_type = field.content_type().map(|s: &str| s.to_string());

        let (file, spool) = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(spool_dir)
            .map_err(|e| spool_error(e, spool_dir))?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut size: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            size += chunk.len() as u64;
            if size > max_size as u64 {
                return Err(too_large(max_size));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| spool_error(e, spool_dir))?;
        }
        file.flush().await.map_err(|e| spool_error(e, spool_dir))?;

        uploaded = Some(UploadedFile {
            spool,
            size,
            file_name,
            content_type,
        });
    }

    uploaded.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))
}

fn spool_error(err: std::io::Error, spool_dir: &Path) -> AppError {
    AppError::Internal(format!(
        "Failed to spool upload under {}: {}",
        spool_dir.display(),
        err
    ))
}

fn too_large(max_size: usize) -> AppError {
    AppError::PayloadTooLarge(format!(
        "File size exceeds maximum allowed size of {} MB",
        max_size / 1024 / 1024
    ))
}

/// The request body limit surfaces as a multipart read error; keep its 413.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(format!("Failed to read multipart: {}", err.body_text()))
    }
}

/// Keep only the final path component and replace anything outside
/// `[A-Za-z0-9._-]`. The extension survives so the raw object keeps it.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    const MAX_FILENAME_LENGTH: usize = 255;

    let filename_only = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    if filename_only.contains("..") {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(['.', '_']).is_empty() {
        return Ok(DEFAULT_FILE_NAME.to_string());
    }

    Ok(sanitized)
}
