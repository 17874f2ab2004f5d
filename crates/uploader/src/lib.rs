//! Upload executor.
//!
//! Drives one file at a time through the abstract [`BlobStore`] capability
//! with bounded exponential-backoff retry on transient errors. The executor
//! is purely functional over its inputs: it never touches the progress
//! store or the state aggregator — the orchestrating caller records the
//! returned [`UploadOutcome`].

mod retry;

pub use retry::{RetryStep, next_step};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use blobsync_types::{BlobError, DiscoveredFile, UploadOutcome};

/// Abstract remote object-storage container.
///
/// The app supplies the concrete transport (HTTP client, authentication,
/// container addressing); the executor only interprets the classified
/// result. Using a trait keeps retry logic decoupled from transport and
/// testable with mocks.
pub trait BlobStore: Send + Sync {
    /// Uploads the bytes of `source` under `blob_name`, overwriting any
    /// existing blob of that name.
    fn upload_blob(
        &self,
        blob_name: &str,
        source: &Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobError>> + Send + '_>>;
}

/// Errors that abort an upload without producing an outcome.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Cancellation observed during backoff; the file is abandoned without
    /// a progress record and will be retried on the next run.
    #[error("upload cancelled")]
    Cancelled,

    /// The caller must attach a fingerprint before handing the file over.
    #[error("file has no fingerprint: {}", .0.display())]
    MissingFingerprint(PathBuf),
}

/// Executes uploads one file at a time.
pub struct UploadExecutor {
    store: Arc<dyn BlobStore>,
    max_retries: u32,
    blob_prefix: Option<String>,
    cancel: CancellationToken,
}

impl UploadExecutor {
    pub fn new(
        store: Arc<dyn BlobStore>,
        max_retries: u32,
        blob_prefix: Option<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            max_retries,
            blob_prefix,
            cancel,
        }
    }

    /// Resolves the target blob name: the file name, joined to the
    /// configured prefix with exactly one separator.
    pub fn blob_name(&self, file_name: &str) -> String {
        match self.blob_prefix.as_deref().map(|p| p.trim_end_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{file_name}"),
            _ => file_name.to_string(),
        }
    }

    /// Uploads one content-addressed file, retrying transient failures with
    /// exponential backoff until success, a permanent error, or retry
    /// exhaustion. The returned outcome is terminal either way.
    pub async fn upload(&self, file: &DiscoveredFile) -> Result<UploadOutcome, UploadError> {
        let fingerprint = file
            .fingerprint
            .clone()
            .ok_or_else(|| UploadError::MissingFingerprint(file.full_path.clone()))?;
        let blob_name = self.blob_name(&file.file_name);

        let mut retries_used: u32 = 0;
        loop {
            debug!(
                blob = %blob_name,
                attempt = retries_used + 1,
                max_attempts = self.max_retries + 1,
                "uploading"
            );

            let result = self.store.upload_blob(&blob_name, &file.full_path).await;

            match next_step(&result, retries_used, self.max_retries) {
                RetryStep::Done => {
                    debug!(blob = %blob_name, size = file.size, "upload succeeded");
                    return Ok(UploadOutcome::succeeded(
                        file.full_path.clone(),
                        blob_name,
                        fingerprint,
                    ));
                }
                RetryStep::Backoff(delay) => {
                    retries_used += 1;
                    warn!(
                        blob = %blob_name,
                        delay_secs = delay.as_secs(),
                        attempt = retries_used + 1,
                        max_attempts = self.max_retries + 1,
                        "transient error, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                    }
                }
                RetryStep::GiveUp(message) => {
                    warn!(blob = %blob_name, error = %message, "upload failed");
                    return Ok(UploadOutcome::failed(
                        file.full_path.clone(),
                        blob_name,
                        fingerprint,
                        message,
                    ));
                }
                RetryStep::Exhausted => {
                    let message = format!("max retries ({}) exceeded", self.max_retries);
                    warn!(blob = %blob_name, "retries exhausted");
                    return Ok(UploadOutcome::failed(
                        file.full_path.clone(),
                        blob_name,
                        fingerprint,
                        message,
                    ));
                }
            }
        }
    }
}
