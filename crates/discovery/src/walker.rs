//! The lazy walk itself.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use blobsync_types::DiscoveredFile;
use tracing::{debug, warn};

use crate::filter::FileFilters;

/// Lazy iterator over discovered files.
///
/// One directory is listed, filtered and sorted at a time; descendant
/// directories of a source folder are expanded (and sorted) when that
/// folder is first reached. Between directories the walk holds no open
/// handles.
pub struct FileWalk<'cb> {
    folders: VecDeque<PathBuf>,
    dirs: VecDeque<(PathBuf, PathBuf)>,
    buffer: VecDeque<DiscoveredFile>,
    recursive: bool,
    filters: FileFilters,
    on_dir: Option<&'cb mut dyn FnMut(&Path)>,
}

impl<'cb> FileWalk<'cb> {
    pub(crate) fn new(folders: Vec<PathBuf>, recursive: bool, filters: FileFilters) -> Self {
        Self {
            folders: folders.into(),
            dirs: VecDeque::new(),
            buffer: VecDeque::new(),
            recursive,
            filters,
            on_dir: None,
        }
    }

    /// Attaches a callback invoked once per visited directory.
    pub(crate) fn with_dir_callback(self, on_dir: &'cb mut dyn FnMut(&Path)) -> Self {
        Self {
            on_dir: Some(on_dir),
            ..self
        }
    }

    /// Lists one directory into the buffer: filter, sort case-insensitively,
    /// non-JSON before JSON.
    fn visit_dir(&mut self, source_folder: &Path, dir: &Path) {
        if let Some(cb) = self.on_dir.as_mut() {
            cb(dir);
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot list directory, skipping");
                return;
            }
        };

        let mut files: Vec<(String, PathBuf, u64)> = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "unreadable directory entry, skipping");
                    continue;
                }
            };
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "cannot stat file, skipping");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.filters.should_include(&name) {
                files.push((name, entry.path(), metadata.len()));
            }
        }

        files.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));
        debug!(dir = %dir.display(), files = files.len(), "visited directory");

        // JSON files are frequently manifests written last; yield them
        // after everything else in the same directory.
        let (json, non_json): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| is_json(&f.0));
        for (_, path, size) in non_json.into_iter().chain(json) {
            self.buffer
                .push_back(DiscoveredFile::new(path, size, source_folder.to_path_buf()));
        }
    }

    /// Expands one source folder into its ordered directory list.
    fn expand_folder(&mut self, folder: PathBuf) {
        self.dirs.push_back((folder.clone(), folder.clone()));
        if !self.recursive {
            return;
        }
        let mut subdirs = Vec::new();
        collect_subdirs(&folder, &mut subdirs);
        subdirs.sort_by(|a, b| {
            a.to_string_lossy()
                .to_lowercase()
                .cmp(&b.to_string_lossy().to_lowercase())
        });
        for dir in subdirs {
            self.dirs.push_back((folder.clone(), dir));
        }
    }
}

impl Iterator for FileWalk<'_> {
    type Item = DiscoveredFile;

    fn next(&mut self) -> Option<DiscoveredFile> {
        loop {
            if let Some(file) = self.buffer.pop_front() {
                return Some(file);
            }
            if let Some((source_folder, dir)) = self.dirs.pop_front() {
                self.visit_dir(&source_folder, &dir);
                continue;
            }
            let folder = self.folders.pop_front()?;
            if !folder.is_dir() {
                warn!(folder = %folder.display(), "source folder does not exist, skipping");
                continue;
            }
            self.expand_folder(folder);
        }
    }
}

/// Recursively collects every descendant directory of `dir`.
///
/// Listing failures are logged and that subtree is skipped; the overall
/// walk continues.
fn collect_subdirs(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list directory, skipping subtree");
            return;
        }
    };
    for entry in entries.flatten() {
        match entry.metadata() {
            Ok(m) if m.is_dir() => {
                let path = entry.path();
                out.push(path.clone());
                collect_subdirs(&path, out);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "cannot stat entry, skipping");
            }
        }
    }
}

fn is_json(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case("json"))
}
