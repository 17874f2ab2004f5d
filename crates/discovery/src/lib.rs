//! File discovery for upload.
//!
//! Walks the configured source folders in a deterministic order and yields
//! [`DiscoveredFile`] candidates. Two enumeration modes, as two explicit
//! operations on one [`Discovery`] value:
//!
//! - [`Discovery::stream`] — a lazy iterator, one directory listed at a
//!   time, for the upload loop itself;
//! - [`Discovery::pre_enumerate`] — an eager full walk that only counts,
//!   for accurate totals and per-folder progress before uploading begins.
//!
//! Determinism matters: progress continuity and reproducible resumption
//! after interruption both rely on repeated runs over an unchanged tree
//! producing the identical file order.

mod filter;
mod walker;

pub use filter::FileFilters;
pub use walker::FileWalk;

use std::path::{Path, PathBuf};

use blobsync_types::DiscoveredFile;

/// Discovery engine over a set of configured source folders.
#[derive(Debug, Clone)]
pub struct Discovery {
    folders: Vec<PathBuf>,
    recursive: bool,
    filters: FileFilters,
}

/// File count for one configured source folder, from pre-enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderFiles {
    pub folder_path: PathBuf,
    pub files: usize,
}

/// Result of an eager pre-enumeration pass. No fingerprints are computed —
/// hashing is only worth doing for files that are actually uploaded.
#[derive(Debug, Clone, Default)]
pub struct EnumerationSummary {
    pub total_folders: usize,
    pub total_files: usize,
    pub per_folder: Vec<FolderFiles>,
}

impl Discovery {
    pub fn new(folders: Vec<PathBuf>, recursive: bool, filters: FileFilters) -> Self {
        Self {
            folders,
            recursive,
            filters,
        }
    }

    /// Lazily yields candidate files in deterministic order.
    ///
    /// Folders that do not exist are logged and skipped; directories that
    /// cannot be listed are logged and skipped. Neither is fatal.
    pub fn stream(&self) -> FileWalk<'static> {
        FileWalk::new(self.folders.clone(), self.recursive, self.filters.clone())
    }

    /// Eagerly walks everything, counting files per source folder.
    ///
    /// `on_folder` is invoked once per visited directory so a display can
    /// report enumeration progress on large trees.
    pub fn pre_enumerate(&self, mut on_folder: impl FnMut(&Path)) -> EnumerationSummary {
        let mut summary = EnumerationSummary {
            total_folders: self.folders.len(),
            ..Default::default()
        };

        for folder in &self.folders {
            let walk = FileWalk::new(vec![folder.clone()], self.recursive, self.filters.clone());
            let count = walk.with_dir_callback(&mut on_folder).count();
            summary.total_files += count;
            summary.per_folder.push(FolderFiles {
                folder_path: folder.clone(),
                files: count,
            });
        }

        summary
    }
}

/// Computes and attaches the fingerprint of `file` on demand.
///
/// Memoized: a file that already carries a fingerprint is left untouched.
/// I/O errors propagate to the caller, which decides whether the file is a
/// per-file failure or worth another pass.
pub fn ensure_fingerprint(file: &mut DiscoveredFile) -> std::io::Result<()> {
    if file.fingerprint.is_some() {
        return Ok(());
    }
    file.fingerprint = Some(blobsync_fingerprint::fingerprint_file(&file.full_path)?);
    Ok(())
}
