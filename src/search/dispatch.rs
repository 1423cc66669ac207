//! Background execution for searches and builds.
//!
//! Every submitted search gets a version number. When a newer search has
//! been submitted by the time an older one finishes, the older result is
//! dropped and reported as `None`, so interactive callers only ever render
//! the answer to the latest input. Superseded queries still run to
//! completion; they are discarded, not cancelled.

use crate::core::error::{Error, Result};
use crate::indexing::bootstrap::build_with;
use crate::indexing::builder::{BuildReport, IndexBuilder};
use crate::search::query::search;
use crate::storage::store::IndexStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Tracks the newest submitted search
#[derive(Debug, Default)]
struct VersionTracker {
    latest: AtomicU64,
}

impl VersionTracker {
    fn next_version(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, version: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == version
    }
}

/// Runs searches on the blocking pool, each with its own store handle
#[derive(Debug, Clone)]
pub struct SearchDispatcher {
    store_path: Arc<PathBuf>,
    versions: Arc<VersionTracker>,
}

impl SearchDispatcher {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: Arc::new(store_path.into()),
            versions: Arc::new(VersionTracker::default()),
        }
    }

    /// Start a search and supersede every earlier one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, term: impl Into<String>, limit: usize) -> PendingSearch {
        let version = self.versions.next_version();
        let term = term.into();
        let store_path = Arc::clone(&self.store_path);

        let handle = tokio::task::spawn_blocking(move || {
            let store = IndexStore::open_existing(&store_path)?;
            search(&store, &term, limit)
        });

        PendingSearch {
            version,
            handle,
            versions: Arc::clone(&self.versions),
        }
    }

    /// Submit and wait in one step
    pub async fn search(&self, term: impl Into<String>, limit: usize) -> Result<Option<Vec<String>>> {
        self.submit(term, limit).outcome().await
    }
}

/// A search running in the background
pub struct PendingSearch {
    version: u64,
    handle: JoinHandle<Result<Vec<String>>>,
    versions: Arc<VersionTracker>,
}

impl PendingSearch {
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Wait for the result. `Ok(None)` means a newer search was submitted
    /// meanwhile and this result is stale.
    pub async fn outcome(self) -> Result<Option<Vec<String>>> {
        let results = self
            .handle
            .await
            .map_err(|e| Error::Task(e.to_string()))??;

        if !self.versions.is_current(self.version) {
            tracing::debug!(version = self.version, "discarding superseded search");
            return Ok(None);
        }
        Ok(Some(results))
    }
}

/// Run a full build on the blocking pool so it never stalls the caller.
///
/// Only one build should run against a store at a time.
pub fn spawn_build(
    root: PathBuf,
    store_path: PathBuf,
    builder: IndexBuilder,
) -> JoinHandle<Result<BuildReport>> {
    tokio::task::spawn_blocking(move || build_with(&root, &store_path, &builder))
}
