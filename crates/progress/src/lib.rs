//! Durable upload progress.
//!
//! A single JSON document records which `(source path, fingerprint)` pairs
//! have completed or failed. It is loaded once at process start, mutated
//! after every file's terminal outcome, and flushed durably before the next
//! file begins. Saves are atomic (write to a temp file, `sync_all`, rename
//! over the target), so a crash can never surface a half-written document.
//!
//! A corrupted or unreadable progress file is never fatal: the worst case
//! of starting fresh is a redundant re-upload, reconciled by overwrite
//! semantics on the target container. Losing the run to a parse error would
//! be strictly worse.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use blobsync_types::{DiscoveredFile, UploadOutcome};

/// Errors from the durable store. `save` failures are fatal to a run:
/// uploading past an unrecordable outcome risks duplicate uploads on the
/// next start.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One persisted row — a completed or failed upload of one file version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub source_path: PathBuf,
    pub blob_name: String,
    pub fingerprint: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The in-memory progress record.
///
/// Invariant: a `(source_path, fingerprint)` pair appears in at most one of
/// the two sets at any time, and at most once within a set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_files: Vec<FileRecord>,
    #[serde(default)]
    pub failed_files: Vec<FileRecord>,

    /// O(1) membership index over completed `(path, fingerprint)` keys.
    /// Rebuilt on load, maintained by every mutation.
    #[serde(skip)]
    completed_index: HashSet<String>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: None,
            completed_files: Vec::new(),
            failed_files: Vec::new(),
            completed_index: HashSet::new(),
        }
    }
}

fn index_key(path: &Path, fingerprint: &str) -> String {
    format!("{}|{}", path.display(), fingerprint)
}

impl Progress {
    /// Idempotence check: true iff the file carries a fingerprint and that
    /// exact `(path, fingerprint)` pair completed before. A file whose
    /// bytes changed since the last successful upload gets a different
    /// fingerprint and is treated as not completed.
    pub fn is_completed(&self, file: &DiscoveredFile) -> bool {
        file.fingerprint
            .as_deref()
            .is_some_and(|fp| self.completed_index.contains(&index_key(&file.full_path, fp)))
    }

    /// Records a success: retires every failed entry for the same source
    /// path, then upserts the completed entry keyed by `(path,
    /// fingerprint)`. Upsert, never append — re-processing the same pair
    /// must not create duplicate rows.
    pub fn mark_completed(&mut self, outcome: &UploadOutcome) {
        self.failed_files
            .retain(|r| r.source_path != outcome.source_path);

        let key = index_key(&outcome.source_path, &outcome.fingerprint);
        let record = FileRecord {
            source_path: outcome.source_path.clone(),
            blob_name: outcome.blob_name.clone(),
            fingerprint: outcome.fingerprint.clone(),
            timestamp: Utc::now(),
            error: None,
        };

        if self.completed_index.contains(&key) {
            if let Some(existing) = self.completed_files.iter_mut().find(|r| {
                r.source_path == outcome.source_path && r.fingerprint == outcome.fingerprint
            }) {
                *existing = record;
            }
        } else {
            self.completed_files.push(record);
            self.completed_index.insert(key);
        }
    }

    /// Records a terminal failure, keyed by `(path, fingerprint)`, carrying
    /// the error message. Drops any completed entry with the identical key
    /// so the disjointness invariant holds unconditionally.
    pub fn mark_failed(&mut self, outcome: &UploadOutcome) {
        let key = index_key(&outcome.source_path, &outcome.fingerprint);
        if self.completed_index.remove(&key) {
            self.completed_files.retain(|r| {
                !(r.source_path == outcome.source_path && r.fingerprint == outcome.fingerprint)
            });
        }

        let record = FileRecord {
            source_path: outcome.source_path.clone(),
            blob_name: outcome.blob_name.clone(),
            fingerprint: outcome.fingerprint.clone(),
            timestamp: Utc::now(),
            error: outcome.error.clone(),
        };

        if let Some(existing) = self.failed_files.iter_mut().find(|r| {
            r.source_path == outcome.source_path && r.fingerprint == outcome.fingerprint
        }) {
            *existing = record;
        } else {
            self.failed_files.push(record);
        }
    }

    fn rebuild_index(&mut self) {
        self.completed_index = self
            .completed_files
            .iter()
            .map(|r| index_key(&r.source_path, &r.fingerprint))
            .collect();
    }
}

/// The durable handle: owns the on-disk location of the progress document.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the prior record, or an empty one when none exists or the file
    /// cannot be parsed.
    pub fn load(&self) -> Progress {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no existing progress file, starting fresh");
            return Progress::default();
        }

        match std::fs::read_to_string(&self.path)
            .map_err(StoreError::from)
            .and_then(|s| serde_json::from_str::<Progress>(&s).map_err(StoreError::from))
        {
            Ok(mut progress) => {
                progress.rebuild_index();
                info!(
                    completed = progress.completed_files.len(),
                    failed = progress.failed_files.len(),
                    "loaded progress"
                );
                progress
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to load progress file, starting fresh");
                Progress::default()
            }
        }
    }

    /// Durably persists the record: serialize to `<path>.tmp`, flush to
    /// disk, atomically rename over the target. Readers (including a
    /// crashed-and-restarted process) observe either the old document or
    /// the new one, never a mix.
    pub fn save(&self, progress: &Progress) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(progress)?;

        {
            use std::io::Write;
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "progress saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ProgressStore) {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path().join("upload-progress.json"));
        (dir, store)
    }

    fn outcome_ok(path: &str, fp: &str) -> UploadOutcome {
        UploadOutcome::succeeded(PathBuf::from(path), format!("blob-{fp}"), fp.into())
    }

    fn outcome_err(path: &str, fp: &str, msg: &str) -> UploadOutcome {
        UploadOutcome::failed(PathBuf::from(path), format!("blob-{fp}"), fp.into(), msg.into())
    }

    fn file(path: &str, fp: &str) -> DiscoveredFile {
        let mut f = DiscoveredFile::new(PathBuf::from(path), 1, PathBuf::from("/src"));
        f.fingerprint = Some(fp.into());
        f
    }

    #[test]
    fn load_missing_returns_empty() {
        let (_dir, store) = store();
        let progress = store.load();
        assert!(progress.completed_files.is_empty());
        assert!(progress.failed_files.is_empty());
        assert!(progress.completed_at.is_none());
    }

    #[test]
    fn load_corrupt_returns_empty() {
        let (_dir, store) = store();
        std::fs::write(store.path(), b"{ not json").unwrap();
        let progress = store.load();
        assert!(progress.completed_files.is_empty());
    }

    #[test]
    fn save_load_roundtrip() {
        let (_dir, store) = store();
        let mut progress = store.load();
        progress.mark_completed(&outcome_ok("/a/1.txt", "fp1"));
        progress.mark_failed(&outcome_err("/a/2.txt", "fp2", "boom"));
        store.save(&progress).unwrap();

        let reloaded = store.load();
        assert_eq!(reloaded.completed_files.len(), 1);
        assert_eq!(reloaded.failed_files.len(), 1);
        assert_eq!(reloaded.failed_files[0].error.as_deref(), Some("boom"));
        assert!(reloaded.is_completed(&file("/a/1.txt", "fp1")));
    }

    #[test]
    fn idempotence_requires_matching_fingerprint() {
        let (_dir, store) = store();
        let mut progress = store.load();
        progress.mark_completed(&outcome_ok("/a/1.txt", "fp1"));

        assert!(progress.is_completed(&file("/a/1.txt", "fp1")));
        // Changed content, same path: not completed.
        assert!(!progress.is_completed(&file("/a/1.txt", "fp2")));
        // No fingerprint attached yet: not completed.
        let bare = DiscoveredFile::new(PathBuf::from("/a/1.txt"), 1, PathBuf::from("/src"));
        assert!(!progress.is_completed(&bare));
    }

    #[test]
    fn mark_completed_upserts() {
        let (_dir, store) = store();
        let mut progress = store.load();
        progress.mark_completed(&outcome_ok("/a/1.txt", "fp1"));
        progress.mark_completed(&outcome_ok("/a/1.txt", "fp1"));
        assert_eq!(progress.completed_files.len(), 1);
    }

    #[test]
    fn success_supersedes_prior_failures_for_path() {
        let (_dir, store) = store();
        let mut progress = store.load();
        progress.mark_failed(&outcome_err("/a/1.txt", "fp-old", "503"));
        progress.mark_failed(&outcome_err("/a/1.txt", "fp-new", "503"));
        assert_eq!(progress.failed_files.len(), 2);

        progress.mark_completed(&outcome_ok("/a/1.txt", "fp-new"));
        assert!(progress.failed_files.is_empty());
        assert_eq!(progress.completed_files.len(), 1);
    }

    #[test]
    fn mark_failed_upserts_and_keeps_sets_disjoint() {
        let (_dir, store) = store();
        let mut progress = store.load();
        progress.mark_failed(&outcome_err("/a/1.txt", "fp1", "first"));
        progress.mark_failed(&outcome_err("/a/1.txt", "fp1", "second"));
        assert_eq!(progress.failed_files.len(), 1);
        assert_eq!(progress.failed_files[0].error.as_deref(), Some("second"));

        progress.mark_completed(&outcome_ok("/a/1.txt", "fp1"));
        progress.mark_failed(&outcome_err("/a/1.txt", "fp1", "regressed"));
        assert!(progress.completed_files.is_empty());
        assert_eq!(progress.failed_files.len(), 1);
        assert!(!progress.is_completed(&file("/a/1.txt", "fp1")));
    }

    #[test]
    fn content_change_keeps_both_versions_distinct() {
        let (_dir, store) = store();
        let mut progress = store.load();
        progress.mark_completed(&outcome_ok("/a/1.txt", "fp-v1"));
        progress.mark_completed(&outcome_ok("/a/1.txt", "fp-v2"));

        // Both versions completed at some point; the current fingerprint
        // decides what is skipped, so the new record is authoritative.
        assert!(progress.is_completed(&file("/a/1.txt", "fp-v2")));
        assert_eq!(progress.completed_files.len(), 2);
    }

    #[test]
    fn unsaved_mark_is_not_durable() {
        let (_dir, store) = store();
        let mut progress = store.load();
        progress.mark_completed(&outcome_ok("/a/1.txt", "fp1"));
        store.save(&progress).unwrap();

        // Marked in memory but the process dies before save.
        progress.mark_completed(&outcome_ok("/a/2.txt", "fp2"));

        let reloaded = store.load();
        assert!(reloaded.is_completed(&file("/a/1.txt", "fp1")));
        assert!(!reloaded.is_completed(&file("/a/2.txt", "fp2")));
    }

    #[test]
    fn stray_temp_file_does_not_corrupt_load() {
        let (_dir, store) = store();
        let mut progress = store.load();
        progress.mark_completed(&outcome_ok("/a/1.txt", "fp1"));
        store.save(&progress).unwrap();

        // A crash can leave a half-written temp file behind.
        std::fs::write(store.path().with_extension("json.tmp"), b"{ half").unwrap();
        let reloaded = store.load();
        assert!(reloaded.is_completed(&file("/a/1.txt", "fp1")));
    }

    #[test]
    fn save_failure_is_reported() {
        let store = ProgressStore::new("/nonexistent-dir/progress.json");
        let progress = Progress::default();
        assert!(store.save(&progress).is_err());
    }
}
