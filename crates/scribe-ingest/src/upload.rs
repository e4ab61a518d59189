//! Loading local files into upload payloads.

use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use scribe_client::UploadFile;
use scribe_core::error::{Result, ScribeError};
use scribe_core::types::ContentKind;

/// Read `path` into an [`UploadFile`].
///
/// The kind is inferred from the extension unless `kind` is given. Files
/// whose extension the kind does not accept are rejected with
/// `ValidationFailed` before anything is read.
pub async fn load_upload(path: &Path, kind: Option<ContentKind>) -> Result<UploadFile> {
    let kind = match kind {
        Some(kind) if kind.accepts(path) => kind,
        Some(kind) => {
            return Err(ScribeError::ValidationFailed(format!(
                "{} is not an accepted {} file (expected one of: {})",
                path.display(),
                kind,
                kind.accepted_extensions().join(", ")
            )))
        }
        None => ContentKind::from_path(path).ok_or_else(|| {
            ScribeError::ValidationFailed(format!(
                "{} has an unsupported file type",
                path.display()
            ))
        })?,
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ScribeError::ValidationFailed(format!("{} has no usable file name", path.display()))
        })?;

    let data = tokio::fs::read(path).await?;
    debug!(path = %path.display(), %kind, bytes = data.len(), "Loaded upload");

    Ok(UploadFile::new(
        filename,
        kind,
        mime_type_for(path),
        Bytes::from(data),
    ))
}

/// MIME type for the multipart part, derived from the extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
