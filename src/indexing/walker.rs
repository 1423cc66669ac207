use crate::core::error::{Error, Result};
use crate::indexing::exclusion::ExclusionSet;
use crate::storage::record::FileRecord;
use ignore::{DirEntry, Walk, WalkBuilder};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters collected while walking. Shared between the walk iterator and
/// the pruning filter.
#[derive(Debug, Default)]
struct WalkCounters {
    directories_visited: AtomicU64,
    directories_pruned: AtomicU64,
    entries_skipped: AtomicU64,
}

/// Snapshot of what a walk has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Directories descended into, root included
    pub directories_visited: u64,
    /// Directories skipped because their name is excluded
    pub directories_pruned: u64,
    /// Entries or subtrees skipped after an access error or a stat race
    pub entries_skipped: u64,
}

/// Depth-first filesystem walker producing [`FileRecord`]s for regular files.
///
/// Symlinks are never followed. Excluded directories are rejected before
/// they are descended into, so none of their children are read.
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    exclusions: ExclusionSet,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>, exclusions: &ExclusionSet) -> Self {
        Self {
            root: root.into(),
            exclusions: exclusions.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start the walk.
    ///
    /// Fails only when the root itself is missing or is not a directory.
    /// Everything below the root is best effort.
    pub fn walk(&self) -> Result<FileRecords> {
        let root = normalize_root(&self.root)?;
        let counters = Arc::new(WalkCounters::default());

        let exclusions = self.exclusions.clone();
        let filter_counters = Arc::clone(&counters);
        let inner = WalkBuilder::new(&root)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !is_directory(entry) {
                    return true;
                }
                let excluded = exclusions.is_excluded(&entry.file_name().to_string_lossy());
                if excluded {
                    filter_counters
                        .directories_pruned
                        .fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(path = %entry.path().display(), "pruned excluded directory");
                }
                !excluded
            })
            .build();

        Ok(FileRecords {
            inner,
            root,
            counters,
        })
    }
}

/// Lazy, single-pass sequence of records from one walk
pub struct FileRecords {
    inner: Walk,
    root: PathBuf,
    counters: Arc<WalkCounters>,
}

impl FileRecords {
    /// The canonical root this walk started from
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> WalkStats {
        WalkStats {
            directories_visited: self.counters.directories_visited.load(Ordering::Relaxed),
            directories_pruned: self.counters.directories_pruned.load(Ordering::Relaxed),
            entries_skipped: self.counters.entries_skipped.load(Ordering::Relaxed),
        }
    }

    fn note_skip(&self) {
        self.counters.entries_skipped.fetch_add(1, Ordering::Relaxed);
    }
}

impl Iterator for FileRecords {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    // Unreadable or vanished directory: its subtree is lost,
                    // the rest of the walk goes on.
                    tracing::debug!(error = %err, "skipping inaccessible entry");
                    self.note_skip();
                    continue;
                }
            };

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                self.counters
                    .directories_visited
                    .fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => return Some(FileRecord::from_metadata(entry.path(), &metadata)),
                Err(err) => {
                    if err.io_error().map(|e| e.kind()) == Some(ErrorKind::NotFound) {
                        tracing::trace!(path = %entry.path().display(), "file vanished before stat");
                    } else {
                        tracing::debug!(path = %entry.path().display(), error = %err, "failed to stat file");
                    }
                    self.note_skip();
                }
            }
        }
    }
}

/// Convenience wrapper: walk `root` with the given exclusions
pub fn walk(root: &Path, exclusions: &ExclusionSet) -> Result<FileRecords> {
    Walker::new(root, exclusions).walk()
}

fn is_directory(entry: &DirEntry) -> bool {
    entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false)
}

fn normalize_root(root: &Path) -> Result<PathBuf> {
    let canonical = std::fs::canonicalize(root).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::RootNotFound(root.to_path_buf()),
        _ => Error::Io(e),
    })?;
    if !canonical.is_dir() {
        return Err(Error::RootNotDirectory(root.to_path_buf()));
    }
    Ok(canonical)
}
