//! Upload Gate
//!
//! Reads the `photo` field out of a multipart body, checks its declared media type and only
//! then writes it to a request-scoped temp file. Rejected files never touch the disk.

use std::path::{Path, PathBuf};

use axum::{
    body::Bytes,
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};
use tempfile::TempPath;

use crate::error::ApiError;

/// Form field carrying the uploaded photo.
pub const PHOTO_FIELD: &str = "photo";

const FALLBACK_FILE_NAME: &str = "upload";

/// IncomingFile
///
/// The `photo` field as received, held in memory and not yet accepted.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// StagedFile
///
/// A file accepted by the gate and written to local staging storage. Dropping the handle
/// deletes the file, so it never outlives the request that created it.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    file_name: String,
    content_type: String,
    size: usize,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// is_image
///
/// True when the primary category of `content_type` (before the `/`) is `image`.
pub fn is_image(content_type: &str) -> bool {
    content_type
        .split('/')
        .next()
        .is_some_and(|primary| primary.trim().eq_ignore_ascii_case("image"))
}

/// read_photo_field
///
/// Walks the multipart stream until the `photo` field, buffering at most `max_bytes`.
/// Other fields are skipped.
pub async fn read_photo_field(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<IncomingFile, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let mut buffer = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            if buffer.len() + chunk.len() > max_bytes {
                return Err(ApiError::PayloadTooLarge { max_bytes });
            }
            buffer.extend_from_slice(&chunk);
        }

        return Ok(IncomingFile {
            file_name,
            content_type,
            bytes: Bytes::from(buffer),
        });
    }

    Err(ApiError::MissingFile)
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { max_bytes }
    } else {
        ApiError::MalformedUpload(err.body_text())
    }
}

/// stage
///
/// The gate itself. Non-image uploads are rejected before anything is written; accepted
/// uploads land in a fresh temp file under `staging_dir`.
pub async fn stage(file: IncomingFile, staging_dir: &Path) -> Result<StagedFile, ApiError> {
    let content_type = match file.content_type {
        Some(content_type) if is_image(&content_type) => content_type,
        other => {
            let content_type = other.unwrap_or_default();
            tracing::info!(%content_type, "upload rejected: not an image");
            return Err(ApiError::UnsupportedMediaType { content_type });
        }
    };

    let file_name = sanitize_file_name(file.file_name.as_deref());
    let size = file.bytes.len();
    let dir: PathBuf = staging_dir.to_path_buf();
    let bytes = file.bytes;

    let path = tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
        use std::io::Write;

        std::fs::create_dir_all(&dir)?;
        let mut staged = tempfile::Builder::new().prefix("photo-").tempfile_in(&dir)?;
        staged.write_all(&bytes)?;
        staged.flush()?;
        Ok(staged.into_temp_path())
    })
    .await
    .map_err(|e| {
        tracing::error!("staging task failed: {:?}", e);
        ApiError::Internal
    })??;

    tracing::debug!(path = %path.display(), %file_name, size, "upload staged");

    Ok(StagedFile {
        path,
        file_name,
        content_type,
        size,
    })
}

/// sanitize_file_name
///
/// Keeps only the final path component of a client-supplied name, so a name like
/// `../../etc/passwd` cannot steer anything built from it.
fn sanitize_file_name(name: Option<&str>) -> String {
    name.and_then(|n| n.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_string()
}
