//! Upload of an encoder output tree to the blob store.

use bytes::Bytes;
use packetized_core::StreamFormat;
use packetized_storage::keys::artifact_key;
use packetized_storage::{Storage, StorageError, StorageResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Content type for a published artifact, by file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("mp4") => "video/mp4",
        Some("m3u8") => "application/x-mpegURL",
        Some("mpd") => "application/dash+xml",
        Some("ts") => "video/mp2t",
        Some("m4s") => "video/iso.segment",
        _ => "application/octet-stream",
    }
}

fn is_manifest(path: &Path) -> bool {
    matches!(
        content_type_for(path),
        "application/x-mpegURL" | "application/dash+xml"
    )
}

/// A media segment of `format`. DASH init segments carry no media and do not count.
fn is_media_segment(path: &Path, format: StreamFormat) -> bool {
    let is_init = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with("init"))
        .unwrap_or(false);
    let extension = path.extension().and_then(|ext| ext.to_str());
    !is_init
        && extension.is_some_and(|ext| ext.eq_ignore_ascii_case(format.segment_extension()))
}

#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    /// Keys uploaded, in upload order.
    pub uploaded_keys: Vec<String>,
    /// Media segments across all variants, init segments excluded.
    pub segment_count: usize,
    pub bytes: u64,
}

impl PublishReport {
    pub fn contains(&self, key: &str) -> bool {
        self.uploaded_keys.iter().any(|k| k == key)
    }
}

/// Uploads every regular file under a local directory to a key prefix.
pub struct Publisher<'a> {
    storage: &'a dyn Storage,
}

impl<'a> Publisher<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Upload every regular file under `local_dir` to `{prefix}/{relative_path}`,
    /// counting the media segments of `format`.
    ///
    /// Playlists and manifests go last so a reader never sees a manifest whose
    /// segments are still missing. Stops at the first error.
    #[tracing::instrument(skip(self, local_dir), fields(local_dir = %local_dir.display()))]
    pub async fn publish_tree(
        &self,
        local_dir: &Path,
        prefix: &str,
        format: StreamFormat,
    ) -> StorageResult<PublishReport> {
        let files = collect_files(local_dir.to_path_buf()).await?;

        let (manifests, artifacts): (Vec<_>, Vec<_>) =
            files.into_iter().partition(|(path, _)| is_manifest(path));

        let mut report = PublishReport::default();
        for (path, relative) in artifacts.into_iter().chain(manifests) {
            let key = artifact_key(prefix, &relative);
            let content_type = content_type_for(&path);
            let data = tokio::fs::read(&path).await?;
            let size = data.len() as u64;

            self.storage
                .put(&key, content_type, Bytes::from(data))
                .await
                .inspect_err(|e| {
                    tracing::error!(key = %key, error = %e, "Artifact upload failed");
                })?;

            tracing::debug!(key = %key, content_type, size, "Uploaded artifact");

            if is_media_segment(&path, format) {
                report.segment_count += 1;
            }
            report.bytes += size;
            report.uploaded_keys.push(key);
        }

        tracing::info!(
            prefix = %prefix,
            files = report.uploaded_keys.len(),
            segments = report.segment_count,
            bytes = report.bytes,
            "Published output tree"
        );

        Ok(report)
    }
}

/// Regular files under `root` with `/`-separated relative paths, sorted.
async fn collect_files(root: PathBuf) -> StorageResult<Vec<(PathBuf, String)>> {
    tokio::task::spawn_blocking(move || -> StorageResult<Vec<(PathBuf, String)>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(|e| StorageError::InvalidKey(e.to_string()))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.push((entry.into_path(), relative));
        }
        Ok(files)
    })
    .await
    .map_err(|e| StorageError::BackendError(format!("Output walk panicked: {}", e)))?
}
