use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid config file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Index root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("Index root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    /// The persisted index could not be opened, created or trusted.
    #[error("Index store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl Error {
    pub(crate) fn store_unavailable(path: &Path, action: &str, err: impl std::fmt::Display) -> Self {
        Error::StoreUnavailable(format!("failed to {} {}: {}", action, path.display(), err))
    }

    /// True when the failure comes from the index store rather than the
    /// filesystem or configuration. Callers must not present these as
    /// "no results".
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_) | Error::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
