use crate::core::config::{Config, DEFAULT_BATCH_SIZE};
use crate::core::error::{Error, Result};
use crate::indexing::exclusion::ExclusionSet;
use crate::indexing::walker::{FileRecords, WalkStats, Walker};
use crate::storage::store::IndexStore;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Progress emitted at each batch commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    /// Records written so far (all committed at this point)
    pub files_indexed: u64,
    /// Batches committed so far
    pub commits: u64,
}

/// Outcome of a finished build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub root: PathBuf,
    pub files_indexed: u64,
    pub commits: u64,
    pub elapsed: Duration,
    pub walk: WalkStats,
}

/// Per-build counters. Lives for exactly one build call.
#[derive(Debug)]
pub struct ScanSession {
    files_written: u64,
    commits: u64,
    started: Instant,
}

impl ScanSession {
    pub fn start() -> Self {
        Self {
            files_written: 0,
            commits: 0,
            started: Instant::now(),
        }
    }

    pub fn record_written(&mut self) {
        self.files_written += 1;
    }

    pub fn record_commit(&mut self) {
        self.commits += 1;
    }

    pub fn progress(&self) -> BuildProgress {
        BuildProgress {
            files_indexed: self.files_written,
            commits: self.commits,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Drives a [`Walker`] into an [`IndexStore`] using batched commits.
///
/// A build is not atomic: if it stops part way, every batch committed
/// before that point stays in the store. Rebuilding is always safe because
/// writes are upserts keyed by path.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    exclusions: ExclusionSet,
    batch_size: usize,
    replace_existing: bool,
}

impl IndexBuilder {
    pub fn new(exclusions: ExclusionSet) -> Self {
        Self {
            exclusions,
            batch_size: DEFAULT_BATCH_SIZE,
            replace_existing: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            exclusions: config.exclusions.clone(),
            batch_size: config.batch_size,
            replace_existing: false,
        }
    }

    /// Upserts per transaction. Larger batches build faster; smaller ones
    /// lose less work on a crash.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Drop every existing record as part of the first committed batch, so
    /// rows for files that no longer exist go away
    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    pub fn build(&self, root: &Path, store: &mut IndexStore) -> Result<BuildReport> {
        self.build_with_progress(root, store, |_| {})
    }

    /// Build the index, calling `on_progress` after every committed batch
    pub fn build_with_progress<F>(
        &self,
        root: &Path,
        store: &mut IndexStore,
        on_progress: F,
    ) -> Result<BuildReport>
    where
        F: FnMut(&BuildProgress),
    {
        let records = self.walk(root)?;
        self.build_from(records, store, on_progress)
    }

    /// Start the walk this builder would perform, without touching a store.
    /// Fails early when the root is unusable.
    pub fn walk(&self, root: &Path) -> Result<FileRecords> {
        Walker::new(root, &self.exclusions).walk()
    }

    /// Write an already-started walk into `store`
    pub fn build_from<F>(
        &self,
        mut records: FileRecords,
        store: &mut IndexStore,
        mut on_progress: F,
    ) -> Result<BuildReport>
    where
        F: FnMut(&BuildProgress),
    {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }

        let walk_root = records.root().to_path_buf();
        tracing::info!(
            root = %walk_root.display(),
            store = %store.path().display(),
            batch_size = self.batch_size,
            replace = self.replace_existing,
            "starting index build"
        );

        let mut session = ScanSession::start();
        let mut writer = store.begin_batch(self.batch_size)?;
        if self.replace_existing {
            writer.clear()?;
        }

        for record in records.by_ref() {
            session.record_written();
            if writer.put(&record)? {
                session.record_commit();
                let progress = session.progress();
                tracing::info!(files = progress.files_indexed, commits = progress.commits, "indexed batch");
                on_progress(&progress);
            }
        }

        let had_tail = writer.has_open_batch();
        let summary = writer.finish()?;
        if had_tail {
            session.record_commit();
            on_progress(&session.progress());
        }
        debug_assert_eq!(summary.commits, session.progress().commits);

        let walk = records.stats();
        let progress = session.progress();
        let report = BuildReport {
            root: walk_root,
            files_indexed: progress.files_indexed,
            commits: progress.commits,
            elapsed: session.elapsed(),
            walk,
        };

        tracing::info!(
            files = report.files_indexed,
            commits = report.commits,
            directories = walk.directories_visited,
            pruned = walk.directories_pruned,
            skipped = walk.entries_skipped,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "finished index build"
        );
        Ok(report)
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(ExclusionSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_files(dir: &Path, n: usize) {
        fs::create_dir_all(dir).unwrap();
        for i in 0..n {
            fs::write(dir.join(format!("f{:03}.txt", i)), "").unwrap();
        }
    }

    #[test]
    fn test_build_empty_tree_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("empty");
        fs::create_dir_all(&root).unwrap();
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();

        let mut calls = 0;
        let report = IndexBuilder::default()
            .build_with_progress(&root, &mut store, |_| calls += 1)
            .unwrap();

        assert_eq!(report.files_indexed, 0);
        assert_eq!(report.commits, 0);
        assert_eq!(calls, 0);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_commits_equal_ceil_n_over_b() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("tree");
        make_files(&root, 10);
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();

        let mut seen = Vec::new();
        let report = IndexBuilder::new(ExclusionSet::empty())
            .batch_size(4)
            .build_with_progress(&root, &mut store, |p| seen.push(*p))
            .unwrap();

        assert_eq!(report.files_indexed, 10);
        assert_eq!(report.commits, 3);
        assert_eq!(store.count().unwrap(), 10);
        assert_eq!(
            seen,
            vec![
                BuildProgress { files_indexed: 4, commits: 1 },
                BuildProgress { files_indexed: 8, commits: 2 },
                BuildProgress { files_indexed: 10, commits: 3 },
            ]
        );
    }

    #[test]
    fn test_exact_multiple_has_no_extra_commit() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("tree");
        make_files(&root, 6);
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();

        let report = IndexBuilder::new(ExclusionSet::empty())
            .batch_size(3)
            .build(&root, &mut store)
            .unwrap();
        assert_eq!(report.commits, 2);
    }

    #[test]
    fn test_missing_root_fails_before_writing() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();

        let result = IndexBuilder::default().build(&temp_dir.path().join("nope"), &mut store);
        assert!(matches!(result, Err(Error::RootNotFound(_))));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();

        let result = IndexBuilder::default()
            .batch_size(0)
            .build(temp_dir.path(), &mut store);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_report_includes_walk_stats() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("tree");
        make_files(&root.join("node_modules"), 3);
        make_files(&root.join("src"), 2);
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();

        let report = IndexBuilder::default().build(&root, &mut store).unwrap();
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.walk.directories_pruned, 1);
        assert_eq!(report.walk.directories_visited, 2);
        assert_eq!(report.root, fs::canonicalize(&root).unwrap());
    }

    #[test]
    fn test_builder_settings() {
        let builder = IndexBuilder::new(ExclusionSet::new(["dist"])).batch_size(9);
        assert!(builder.exclusions().is_excluded("dist"));
        assert!(!builder.exclusions().is_excluded(".git"));

        let config = Config::new(Some(PathBuf::from("/tmp/qf"))).unwrap();
        let from_config = IndexBuilder::from_config(&config);
        assert_eq!(from_config.exclusions().len(), config.exclusions.len());
    }

    #[test]
    fn test_replace_existing_drops_stale_rows() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("tree");
        make_files(&root, 5);
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();

        let builder = IndexBuilder::new(ExclusionSet::empty()).batch_size(2);
        builder.build(&root, &mut store).unwrap();
        fs::remove_file(root.join("f000.txt")).unwrap();

        // A plain rebuild only upserts
        builder.build(&root, &mut store).unwrap();
        assert_eq!(store.count().unwrap(), 5);

        let report = builder
            .replace_existing(true)
            .build(&root, &mut store)
            .unwrap();
        assert_eq!(report.files_indexed, 4);
        assert_eq!(report.commits, 2);
        assert_eq!(store.count().unwrap(), 4);
    }

    #[test]
    fn test_replace_existing_keeps_old_rows_until_first_commit() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("tree");
        make_files(&root, 3);
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();
        let builder = IndexBuilder::new(ExclusionSet::empty()).batch_size(10);
        builder.build(&root, &mut store).unwrap();

        // The build fails after clearing but before anything commits
        let mut writer = store.begin_batch(10).unwrap();
        writer.clear().unwrap();
        for record in builder.walk(&root).unwrap().take(1) {
            writer.put(&record).unwrap();
        }
        drop(writer);

        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_replace_existing_on_empty_tree_empties_store() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("tree");
        make_files(&root, 2);
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();
        IndexBuilder::default().build(&root, &mut store).unwrap();

        let empty = temp_dir.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        let mut calls = 0;
        let report = IndexBuilder::default()
            .replace_existing(true)
            .build_with_progress(&empty, &mut store, |_| calls += 1)
            .unwrap();

        assert_eq!(report.files_indexed, 0);
        assert_eq!(report.commits, 1);
        assert_eq!(calls, 1);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_scan_session_counts() {
        let mut session = ScanSession::start();
        session.record_written();
        session.record_written();
        session.record_commit();
        assert_eq!(
            session.progress(),
            BuildProgress { files_indexed: 2, commits: 1 }
        );
    }
}
