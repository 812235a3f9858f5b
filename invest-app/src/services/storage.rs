//! Upload storage under `<root>/uploads/<request_id>/<document_id>-<name>`

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ServiceError, ServiceResult};

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "csv", "ppt", "pptx", "txt", "md",
];

/// Default upload size limit (50 MiB), overridden by setting `upload_max_bytes`
pub const DEFAULT_MAX_UPLOAD_BYTES: i64 = 50 * 1024 * 1024;

/// Reduce a client-supplied filename to a safe basename
///
/// Directory components are dropped; characters outside `[A-Za-z0-9._-]`
/// become `_`.
pub fn sanitize_filename(name: &str) -> ServiceResult<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        return Err(ServiceError::InvalidInput(format!("Invalid filename: '{}'", name)));
    }
    Ok(sanitized)
}

/// Lowercase extension without the dot
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

pub fn mime_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        "md" => "text/markdown",
        _ => "application/octet-stream",
    }
}

/// Check name and size before any bytes are written
pub fn validate_upload(name: &str, size: u64, max_bytes: u64) -> ServiceResult<String> {
    let sanitized = sanitize_filename(name)?;

    let extension = extension_of(&sanitized).unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ServiceError::InvalidInput(format!(
            "File type '.{}' is not allowed (allowed: {})",
            extension,
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    if size == 0 {
        return Err(ServiceError::InvalidInput(format!("File '{}' is empty", name)));
    }
    if size > max_bytes {
        return Err(ServiceError::PayloadTooLarge(format!(
            "File '{}' is {} bytes, limit is {} bytes",
            name, size, max_bytes
        )));
    }

    Ok(sanitized)
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    pub sanitized_name: String,
    pub mime_type: &'static str,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct DocumentStorage {
    uploads_root: PathBuf,
}

impl DocumentStorage {
    pub fn new(uploads_root: impl Into<PathBuf>) -> Self {
        Self {
            uploads_root: uploads_root.into(),
        }
    }

    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }

    pub fn path_for(&self, request_id: Uuid, document_id: Uuid, sanitized_name: &str) -> PathBuf {
        self.uploads_root
            .join(request_id.to_string())
            .join(format!("{}-{}", document_id, sanitized_name))
    }

    /// Validate and write one upload
    pub async fn store(
        &self,
        request_id: Uuid,
        document_id: Uuid,
        original_name: &str,
        bytes: &[u8],
        max_bytes: u64,
    ) -> ServiceResult<StoredFile> {
        let sanitized_name = validate_upload(original_name, bytes.len() as u64, max_bytes)?;
        let path = self.path_for(request_id, document_id, &sanitized_name);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "Stored upload");

        let extension = extension_of(&sanitized_name).unwrap_or_default();
        Ok(StoredFile {
            path,
            mime_type: mime_type_for(&extension),
            sanitized_name,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Best-effort removal of a stored upload
    pub async fn remove(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), "Failed to remove stored upload: {}", e);
        }
    }
}
