//! Upload orchestration.
//!
//! [`UploadPipeline::run`] drives the whole flow, one file at a time:
//! discover → idempotence check → fingerprint → upload → record → aggregate.
//! The pipeline is the sole writer of both the progress store and the run
//! state; observers read state snapshots concurrently.
//!
//! Persistence discipline: every file's terminal outcome is saved durably
//! before the next file begins. A save failure aborts the run — continuing
//! without a durable record would risk duplicate uploads on the next start.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use blobsync_discovery::{Discovery, FileFilters};
use blobsync_progress::{ProgressStore, StoreError};
use blobsync_state::{FolderProgress, StateTracker};
use blobsync_types::{UploadOutcome, folder_display_name};
use blobsync_uploader::{BlobStore, UploadError, UploadExecutor};

/// Everything the pipeline needs to know, supplied by the app's
/// configuration layer.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub source_folders: Vec<PathBuf>,
    pub recursive: bool,
    pub filters: FileFilters,
    /// Optional pause between files, to stay polite to the remote.
    pub delay_between_files_ms: u64,
    pub max_retries: u32,
    pub blob_prefix: Option<String>,
    /// Location of the durable progress document.
    pub progress_path: PathBuf,
    /// Display label for the destination container.
    pub destination: String,
    /// Walk everything up front for accurate totals and per-folder
    /// progress, at the cost of one extra pass.
    pub pre_enumerate: bool,
}

/// Fatal pipeline errors. Per-file failures are not errors — they are
/// recorded outcomes and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no source folders configured")]
    NoSourceFolders,

    #[error("progress store error: {0}")]
    Store(#[from] StoreError),
}

/// Terminal counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// True when the run stopped on the shared cancellation signal rather
    /// than draining discovery. Not an error.
    pub cancelled: bool,
}

/// The sequential upload loop.
pub struct UploadPipeline {
    settings: PipelineSettings,
    blob_store: Arc<dyn BlobStore>,
    state: Arc<StateTracker>,
    cancel: CancellationToken,
}

impl UploadPipeline {
    pub fn new(
        settings: PipelineSettings,
        blob_store: Arc<dyn BlobStore>,
        state: Arc<StateTracker>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            blob_store,
            state,
            cancel,
        }
    }

    /// Runs the pipeline to completion, cancellation, or a fatal error.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        if self.settings.source_folders.is_empty() {
            return Err(PipelineError::NoSourceFolders);
        }

        self.state.initialize(
            self.settings.source_folders.clone(),
            &self.settings.destination,
            self.settings.delay_between_files_ms,
        );

        let store = ProgressStore::new(&self.settings.progress_path);
        let mut progress = store.load();

        let discovery = Discovery::new(
            self.settings.source_folders.clone(),
            self.settings.recursive,
            self.settings.filters.clone(),
        );

        if self.settings.pre_enumerate {
            self.pre_enumerate(&discovery);
        }

        let executor = UploadExecutor::new(
            Arc::clone(&self.blob_store),
            self.settings.max_retries,
            self.settings.blob_prefix.clone(),
            self.cancel.clone(),
        );

        let mut summary = RunSummary::default();
        let mut current_folder: Option<PathBuf> = None;

        info!("starting file discovery");
        for mut file in discovery.stream() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            summary.discovered += 1;
            if !self.settings.pre_enumerate {
                self.state.increment_discovered();
            }

            let folder = file.source_folder.clone();
            if self.settings.pre_enumerate && current_folder.as_deref() != Some(folder.as_path()) {
                self.state.set_current_folder(&folder);
                current_folder = Some(folder.clone());
            }

            if let Err(e) = blobsync_discovery::ensure_fingerprint(&mut file) {
                warn!(path = %file.full_path.display(), error = %e, "cannot fingerprint file");
                let outcome = UploadOutcome::failed(
                    file.full_path.clone(),
                    executor.blob_name(&file.file_name),
                    String::new(),
                    format!("cannot fingerprint file: {e}"),
                );
                progress.mark_failed(&outcome);
                store.save(&progress)?;
                summary.failed += 1;
                self.state
                    .record_failed(outcome.error.as_deref(), Some(&folder));
                continue;
            }

            if progress.is_completed(&file) {
                debug!(path = %file.full_path.display(), "already uploaded, skipping");
                summary.skipped += 1;
                self.state.record_skipped(Some(&folder));
                continue;
            }

            self.state.set_current_file(&file.full_path, file.size);
            info!(
                n = summary.discovered,
                path = %file.full_path.display(),
                size = file.size,
                "processing file"
            );

            let outcome = match executor.upload(&file).await {
                Ok(outcome) => outcome,
                Err(UploadError::Cancelled) => {
                    // Abandoned without a record; it will be retried,
                    // correctly, on the next run.
                    summary.cancelled = true;
                    break;
                }
                Err(e @ UploadError::MissingFingerprint(_)) => UploadOutcome::failed(
                    file.full_path.clone(),
                    executor.blob_name(&file.file_name),
                    String::new(),
                    e.to_string(),
                ),
            };

            if outcome.success {
                progress.mark_completed(&outcome);
            } else {
                progress.mark_failed(&outcome);
            }
            store.save(&progress)?;

            if outcome.success {
                summary.succeeded += 1;
                self.state.record_success(Some(&folder));
            } else {
                summary.failed += 1;
                self.state
                    .record_failed(outcome.error.as_deref(), Some(&folder));
            }

            if self.settings.delay_between_files_ms > 0 {
                let delay =
                    std::time::Duration::from_millis(self.settings.delay_between_files_ms);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => {
                        summary.cancelled = true;
                        break;
                    }
                }
            }
        }

        if summary.cancelled {
            info!(
                discovered = summary.discovered,
                succeeded = summary.succeeded,
                skipped = summary.skipped,
                failed = summary.failed,
                "upload run cancelled"
            );
            return Ok(summary);
        }

        progress.completed_at = Some(chrono::Utc::now());
        store.save(&progress)?;
        self.state.set_completed();

        info!(
            discovered = summary.discovered,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "upload run complete"
        );
        Ok(summary)
    }

    /// Eager pass: fix the totals and the per-folder breakdown before the
    /// first upload, reporting each visited directory along the way.
    fn pre_enumerate(&self, discovery: &Discovery) {
        self.state.set_enumerating(true, Some("enumerating folders"));
        let enumeration = discovery.pre_enumerate(|dir| {
            self.state
                .set_enumerating(true, Some(&format!("scanning {}", dir.display())));
        });

        let folder_progress: Vec<FolderProgress> = enumeration
            .per_folder
            .iter()
            .map(|f| FolderProgress {
                folder_path: f.folder_path.clone(),
                display_name: folder_display_name(&f.folder_path),
                total_files: f.files,
                ..Default::default()
            })
            .collect();

        info!(
            folders = enumeration.total_folders,
            files = enumeration.total_files,
            "pre-enumeration complete"
        );
        self.state.set_enumeration_counts(
            enumeration.total_folders,
            enumeration.total_files,
            folder_progress,
        );
        self.state.set_enumerating(false, None);
    }
}
