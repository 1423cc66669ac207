use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Metadata for one indexed file. `path` is the identity: the store keeps
/// at most one record per path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Normalized absolute path
    pub path: String,
    /// Base name
    pub name: String,
    /// Lowercased suffix after the final `.`, without the dot; empty if none
    pub extension: String,
    /// Seconds since the Unix epoch
    pub modified_time: f64,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, name: impl Into<String>, modified_time: f64) -> Self {
        let name = name.into();
        Self {
            path: path.into(),
            extension: extension_of(&name),
            name,
            modified_time,
        }
    }

    /// Build a record from an already-normalized path and its (no-follow)
    /// metadata
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified_time = metadata.modified().map(system_time_secs).unwrap_or(0.0);
        Self::new(path.to_string_lossy().into_owned(), name, modified_time)
    }
}

/// Lowercased extension of a file name. Dot-files like `.bashrc` have none.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn system_time_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}
