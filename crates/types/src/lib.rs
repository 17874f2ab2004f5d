//! Shared data types for the upload pipeline.
//!
//! These are the values that flow between the discovery engine, the upload
//! executor, the progress store, and the state aggregator. Keeping them in
//! one small crate avoids dependency cycles between the pipeline stages.

use std::path::{Path, PathBuf};

/// A file found by the discovery engine, candidate for upload.
///
/// The fingerprint starts out empty and is attached later, once the file is
/// actually selected for processing — hashing is expensive and pointless for
/// files that end up skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Absolute path of the file on disk.
    pub full_path: PathBuf,
    /// Base name, used to derive the target blob name.
    pub file_name: String,
    /// Size in bytes at discovery time.
    pub size: u64,
    /// Content fingerprint (base64 digest), filled in lazily.
    pub fingerprint: Option<String>,
    /// The configured source folder this file was discovered under.
    pub source_folder: PathBuf,
}

impl DiscoveredFile {
    /// Creates a discovered file without a fingerprint.
    pub fn new(full_path: PathBuf, size: u64, source_folder: PathBuf) -> Self {
        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            full_path,
            file_name,
            size,
            fingerprint: None,
            source_folder,
        }
    }
}

/// Immutable result of one upload — after retries succeeded or were
/// exhausted. Produced by the executor, consumed by the progress store and
/// the state aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    pub source_path: PathBuf,
    pub blob_name: String,
    pub fingerprint: String,
    pub error: Option<String>,
}

impl UploadOutcome {
    /// Successful upload of `source_path` to `blob_name`.
    pub fn succeeded(source_path: PathBuf, blob_name: String, fingerprint: String) -> Self {
        Self {
            success: true,
            source_path,
            blob_name,
            fingerprint,
            error: None,
        }
    }

    /// Terminal failure carrying the underlying error message.
    pub fn failed(
        source_path: PathBuf,
        blob_name: String,
        fingerprint: String,
        error: String,
    ) -> Self {
        Self {
            success: false,
            source_path,
            blob_name,
            fingerprint,
            error: Some(error),
        }
    }
}

/// Error half of the abstract `upload_blob` capability.
///
/// The remote adapter classifies its failures; the executor only ever asks
/// "is this worth retrying" via [`BlobError::is_transient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    /// Server overload, rate limiting, or a 5xx-class condition — expected
    /// to resolve if retried after a delay.
    #[error("transient storage error: {0}")]
    Transient(String),

    /// Anything else. Not retried.
    #[error("{0}")]
    Permanent(String),
}

impl BlobError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BlobError::Transient(_))
    }

    /// The underlying message, without the classification prefix.
    pub fn message(&self) -> &str {
        match self {
            BlobError::Transient(m) | BlobError::Permanent(m) => m,
        }
    }
}

/// Returns a display-friendly name for a folder path (its last component).
pub fn folder_display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
