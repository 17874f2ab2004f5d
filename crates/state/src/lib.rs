//! Shared run state (thread-safe).
//!
//! The pipeline is the sole writer; any number of observers (a display
//! loop, a status logger) read concurrently. All mutations go through
//! [`StateTracker`], which holds the state behind one lock and hands out
//! deep-copied snapshots — readers never see the live structure and cannot
//! mutate shared state through a returned value.
//!
//! Every mutation raises a change notification AFTER the lock is released,
//! so an observer that synchronously re-reads the state from its callback
//! cannot deadlock.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};

/// Progress counters for one configured source folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderProgress {
    pub folder_path: PathBuf,
    pub display_name: String,
    pub total_files: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub is_current: bool,
}

impl FolderProgress {
    pub fn processed(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    pub fn is_completed(&self) -> bool {
        self.processed() >= self.total_files
    }
}

/// The file currently in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Aggregate run state. Snapshots of this are what observers receive.
#[derive(Debug, Clone)]
pub struct RunState {
    pub source_folders: Vec<PathBuf>,
    pub destination: String,
    pub total_discovered: usize,
    pub total_folders: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub current_file: Option<CurrentFile>,
    pub last_error: Option<String>,
    pub session_started_at: DateTime<Utc>,
    pub throttle_delay_ms: u64,
    pub is_completed: bool,
    pub is_enumerating: bool,
    pub enumeration_status: String,
    pub folder_progress: Vec<FolderProgress>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            source_folders: Vec::new(),
            destination: String::new(),
            total_discovered: 0,
            total_folders: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            current_file: None,
            last_error: None,
            session_started_at: Utc::now(),
            throttle_delay_ms: 0,
            is_completed: false,
            is_enumerating: false,
            enumeration_status: String::new(),
            folder_progress: Vec::new(),
        }
    }
}

impl RunState {
    pub fn processed(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

/// Observer callback, invoked with a fresh snapshot after every mutation.
pub type ChangeCallback = Box<dyn Fn(&RunState) + Send + Sync>;

/// Owns the run state; the only way to mutate it.
pub struct StateTracker {
    state: Mutex<RunState>,
    callbacks: RwLock<Vec<ChangeCallback>>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RunState::default()),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Registers an observer. Callbacks run on the mutating thread, with no
    /// internal lock held.
    pub fn on_change(&self, callback: ChangeCallback) {
        self.callbacks.write().unwrap().push(callback);
    }

    /// Deep-copied snapshot of the current state.
    pub fn snapshot(&self) -> RunState {
        self.state.lock().unwrap().clone()
    }

    /// Resets everything and stamps the session start.
    pub fn initialize(&self, source_folders: Vec<PathBuf>, destination: &str, throttle_ms: u64) {
        self.mutate(|s| {
            *s = RunState {
                source_folders,
                destination: destination.to_string(),
                throttle_delay_ms: throttle_ms,
                session_started_at: Utc::now(),
                ..RunState::default()
            };
        });
    }

    /// Streaming-mode discovery counter. Not used when pre-enumeration has
    /// already fixed the total.
    pub fn increment_discovered(&self) {
        self.mutate(|s| s.total_discovered += 1);
    }

    pub fn set_current_file(&self, path: &Path, size: u64) {
        self.mutate(|s| {
            s.current_file = Some(CurrentFile {
                path: path.to_path_buf(),
                size,
            });
        });
    }

    pub fn record_success(&self, folder: Option<&Path>) {
        self.mutate(|s| {
            s.succeeded += 1;
            s.last_error = None;
            bump_folder(s, folder, |f| f.succeeded += 1);
        });
    }

    pub fn record_skipped(&self, folder: Option<&Path>) {
        self.mutate(|s| {
            s.skipped += 1;
            bump_folder(s, folder, |f| f.skipped += 1);
        });
    }

    pub fn record_failed(&self, error: Option<&str>, folder: Option<&Path>) {
        self.mutate(|s| {
            s.failed += 1;
            s.last_error = error.map(str::to_string);
            bump_folder(s, folder, |f| f.failed += 1);
        });
    }

    /// Marks the run terminal and clears the current-file field.
    pub fn set_completed(&self) {
        self.mutate(|s| {
            s.is_completed = true;
            s.current_file = None;
        });
    }

    pub fn set_enumerating(&self, enumerating: bool, status: Option<&str>) {
        self.mutate(|s| {
            s.is_enumerating = enumerating;
            s.enumeration_status = status.unwrap_or_default().to_string();
        });
    }

    /// Publishes pre-enumeration totals and the per-folder breakdown.
    pub fn set_enumeration_counts(
        &self,
        total_folders: usize,
        total_files: usize,
        folder_progress: Vec<FolderProgress>,
    ) {
        self.mutate(|s| {
            s.total_folders = total_folders;
            s.total_discovered = total_files;
            s.folder_progress = folder_progress;
        });
    }

    /// Marks exactly one folder entry as current; all others are cleared.
    pub fn set_current_folder(&self, folder_path: &Path) {
        self.mutate(|s| {
            for folder in &mut s.folder_progress {
                folder.is_current = folder.folder_path == folder_path;
            }
        });
    }

    /// Runs `f` under the lock, then notifies observers with a snapshot
    /// taken before the lock was released.
    fn mutate(&self, f: impl FnOnce(&mut RunState)) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            f(&mut state);
            state.clone()
        };
        for callback in self.callbacks.read().unwrap().iter() {
            callback(&snapshot);
        }
    }
}

fn bump_folder(state: &mut RunState, folder: Option<&Path>, bump: impl FnOnce(&mut FolderProgress)) {
    if let Some(path) = folder {
        if let Some(entry) = state
            .folder_progress
            .iter_mut()
            .find(|f| f.folder_path == path)
        {
            bump(entry);
        }
    }
}
