//! File registry: metadata of every document uploaded in a session.
//!
//! The registry is keyed by file name: a second upload under the same name
//! is rejected before anything is sent to the storage service. Removing an
//! entry only forgets it locally; the remote copy lives on until the
//! service's own retention window closes.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::FileError;
use crate::provider::{FileStore, RemoteHandle, UploadMetadata};

/// Largest file accepted for upload (2 GiB).
pub const MAX_FILE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Extensions offered by the upload widgets.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "csv", "txt"];

/// A document that was uploaded successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// File name as uploaded (unique within a session)
    pub name: String,

    /// Size in bytes as reported by the uploader
    pub size_bytes: u64,

    /// MIME type derived from the extension
    pub mime_type: String,

    /// Handle returned by the storage service
    pub remote: RemoteHandle,

    pub uploaded_at: DateTime<Utc>,
}

impl UploadedFile {
    /// Upload time as shown in file lists (`HH:MM:SS`, local time).
    pub fn uploaded_time(&self) -> String {
        self.uploaded_at
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }

    pub fn icon(&self) -> &'static str {
        file_icon(&self.mime_type)
    }

    pub fn formatted_size(&self) -> String {
        format_file_size(self.size_bytes)
    }
}

/// Ordered set of uploaded files, unique by name.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    files: Vec<UploadedFile>,
    max_file_bytes: u64,
}

impl FileRegistry {
    /// Create an empty registry with the default 2 GiB limit.
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            max_file_bytes: MAX_FILE_BYTES,
        }
    }

    /// Lower the per-file size limit. Values above 2 GiB are clamped.
    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max.min(MAX_FILE_BYTES);
        self
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Validate an upload without touching the storage service.
    pub fn check_admissible(&self, filename: &str, size_bytes: u64) -> Result<(), FileError> {
        if self.contains(filename) {
            return Err(FileError::DuplicateName(filename.to_string()));
        }
        if size_bytes > self.max_file_bytes {
            return Err(FileError::FileTooLarge {
                name: filename.to_string(),
                size_bytes,
                limit_bytes: self.max_file_bytes,
            });
        }
        Ok(())
    }

    /// Upload a document and register it.
    ///
    /// Nothing is registered unless the storage service accepts the bytes.
    pub async fn upload(
        &mut self,
        store: &dyn FileStore,
        raw_bytes: Vec<u8>,
        filename: &str,
        size_bytes: u64,
    ) -> Result<UploadedFile, FileError> {
        self.check_admissible(filename, size_bytes)?;

        let mime_type = mime_type_for(filename);
        info!(
            file = %filename,
            size = size_bytes,
            mime = %mime_type,
            store = store.name(),
            "Uploading file"
        );

        let metadata = UploadMetadata {
            mime_type: mime_type.to_string(),
            display_name: filename.to_string(),
        };
        let remote = store.upload(raw_bytes, metadata).await.map_err(|source| {
            warn!(file = %filename, error = %source, "Upload failed");
            FileError::RemoteUpload {
                name: filename.to_string(),
                source,
            }
        })?;

        let file = UploadedFile {
            name: filename.to_string(),
            size_bytes,
            mime_type: mime_type.to_string(),
            remote,
            uploaded_at: Utc::now(),
        };
        self.files.push(file.clone());
        Ok(file)
    }

    /// Forget one file. The remote copy is left to expire.
    pub fn remove(&mut self, name: &str) -> Result<UploadedFile, FileError> {
        let idx = self
            .files
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| FileError::NotFound(name.to_string()))?;
        let removed = self.files.remove(idx);
        info!(file = %name, "Removed file from registry");
        Ok(removed)
    }

    /// Forget every file. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.files.len();
        self.files.clear();
        info!(count, "Cleared file registry");
        count
    }

    /// Files in upload order.
    pub fn list(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn get(&self, name: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// MIME type for a file name, by extension only.
pub fn mime_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "csv" => "text/csv",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Human-readable size: one decimal, binary units, `0B` for empty files.
pub fn format_file_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0B".into();
    }

    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{size:.1}{}", UNITS[unit])
}

/// Emoji shown next to a file of the given MIME type.
pub fn file_icon(mime_type: &str) -> &'static str {
    if mime_type.starts_with("application/pdf") {
        "📄"
    } else if mime_type.starts_with("text/csv") {
        "📊"
    } else if mime_type.starts_with("text/") {
        "📝"
    } else if mime_type.contains("spreadsheet") || mime_type.contains("excel") {
        "📈"
    } else if mime_type.contains("document") || mime_type.contains("word") {
        "📄"
    } else {
        "📁"
    }
}
