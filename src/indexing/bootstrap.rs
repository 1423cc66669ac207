use crate::core::error::Result;
use crate::indexing::builder::{BuildReport, IndexBuilder};
use crate::storage::store::IndexStore;
use std::path::Path;

/// What [`ensure_index`] had to do
#[derive(Debug, Clone)]
pub enum IndexStatus {
    /// A usable index was already present
    Ready,
    /// No usable index existed, so one was built
    Built(BuildReport),
}

impl IndexStatus {
    pub fn was_built(&self) -> bool {
        matches!(self, IndexStatus::Built(_))
    }
}

/// Make sure a queryable index exists at `store_path`, building one from
/// `root` with default settings if not.
///
/// This only checks existence. An index that is present but out of date
/// with the filesystem is left alone.
pub fn ensure_index(root: &Path, store_path: &Path) -> Result<IndexStatus> {
    ensure_index_with(root, store_path, &IndexBuilder::default())
}

/// [`ensure_index`] with a caller-supplied builder
pub fn ensure_index_with(
    root: &Path,
    store_path: &Path,
    builder: &IndexBuilder,
) -> Result<IndexStatus> {
    if IndexStore::probe(store_path)? {
        tracing::debug!(store = %store_path.display(), "index present");
        return Ok(IndexStatus::Ready);
    }

    tracing::info!(store = %store_path.display(), "index missing, building now");
    build_with(root, store_path, builder).map(IndexStatus::Built)
}

/// Open (or create) the store at `store_path` and index `root` into it with
/// default settings
pub fn build(root: &Path, store_path: &Path) -> Result<BuildReport> {
    build_with(root, store_path, &IndexBuilder::default())
}

/// [`build`] with a caller-supplied builder
pub fn build_with(root: &Path, store_path: &Path, builder: &IndexBuilder) -> Result<BuildReport> {
    // Walk first so a bad root never leaves an empty store that would
    // later pass the existence check
    let records = builder.walk(root)?;
    let mut store = IndexStore::open(store_path)?;
    builder.build_from(records, &mut store, |_| {})
}
