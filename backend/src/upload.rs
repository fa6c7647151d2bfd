use std::path::Path;

use thiserror::Error;
use tokio::fs;

/// Failures while persisting an uploaded receipt. The validation variants
/// are client errors; Io is a server-side failure.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No selected file")]
    EmptyFilename,
    #[error("Empty file")]
    EmptyFile,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reduce a client-supplied filename to a safe storage name: path components
/// are stripped, anything outside [A-Za-z0-9._-] becomes '_', and leading
/// dots are dropped so the result can never be a hidden or traversal name.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Persist receipt bytes under `upload_dir` with a unique, sanitized name
/// and return the path the file can be served back from.
///
/// Validation runs before anything touches the filesystem: empty input or a
/// name that sanitizes to nothing is rejected with no file written.
pub async fn store_receipt(
    upload_dir: &Path,
    original_name: &str,
    bytes: &[u8],
) -> Result<String, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::EmptyFile);
    }

    let sanitized = sanitize_filename(original_name);
    if sanitized.is_empty() {
        return Err(UploadError::EmptyFilename);
    }

    let unique_name = format!("{}_{}", chrono::Utc::now().timestamp(), sanitized);
    fs::write(upload_dir.join(&unique_name), bytes).await?;

    Ok(format!("/uploads/{}", unique_name))
}
