use std::collections::HashSet;
use std::sync::Arc;

/// Directory names skipped by default: VCS metadata, tool caches, build output.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    // Version control / dev
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    ".idea",
    ".vscode",
    // System / caches
    ".cache",
    "Cache",
    "Caches",
    "tmp",
    "Temp",
    "log",
    "logs",
    "Trash",
    ".mozilla",
    ".thumbnails",
    ".npm",
    ".pip",
    // Large build/runtime folders
    ".gradle",
    "build",
    "dist",
    ".tox",
    ".mypy_cache",
];

/// Immutable set of directory basenames whose whole subtree is pruned
/// during a walk.
///
/// Matching is exact and case-sensitive, against the directory's own name
/// only, at any depth. Cloning is cheap; the set is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSet {
    names: Arc<HashSet<String>>,
}

impl ExclusionSet {
    /// Build a set from arbitrary names
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Arc::new(names.into_iter().map(Into::into).collect()),
        }
    }

    /// A set that excludes nothing
    pub fn empty() -> Self {
        Self::new(std::iter::empty::<String>())
    }

    /// Returns a new set containing these names plus `extra`
    pub fn extended<I, S>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: HashSet<String> = (*self.names).clone();
        names.extend(extra.into_iter().map(Into::into));
        Self {
            names: Arc::new(names),
        }
    }

    /// Whether a directory with this basename must be skipped
    pub fn is_excluded(&self, directory_name: &str) -> bool {
        self.names.contains(directory_name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in the set, sorted for stable display
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.into_iter()
    }
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_DIRS.iter().copied())
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}
