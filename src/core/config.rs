use super::error::{Error, Result};
use crate::indexing::exclusion::ExclusionSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Upserts per transaction during a build
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Result cap for a search when the caller does not give one
pub const DEFAULT_RESULT_LIMIT: usize = 50;

/// Name of the optional settings file inside the base directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration for quickfind
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for quickfind data
    pub base_dir: PathBuf,
    /// Location of the SQLite index file
    pub database_path: PathBuf,
    /// Directory tree indexed by default
    pub root: PathBuf,
    /// Upserts grouped into one transaction while building
    pub batch_size: usize,
    /// Default maximum number of search results
    pub result_limit: usize,
    /// Directory names pruned during the walk
    pub exclusions: ExclusionSet,
}

/// On-disk overrides, every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    root: Option<PathBuf>,
    database_path: Option<PathBuf>,
    batch_size: Option<usize>,
    result_limit: Option<usize>,
    /// Replaces the default exclusion list
    exclusions: Option<Vec<String>>,
    /// Added on top of whichever exclusion list is active
    extra_exclusions: Option<Vec<String>>,
}

impl Config {
    /// Get the default configuration directory
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
            .map(|home| home.join(".quickfind"))
    }

    /// Create a new configuration with built-in defaults
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.unwrap_or_else(|| {
            Self::default_base_dir().unwrap_or_else(|_| PathBuf::from(".quickfind"))
        });
        let root = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            database_path: base_dir.join("database").join("file_index.db"),
            root,
            batch_size: DEFAULT_BATCH_SIZE,
            result_limit: DEFAULT_RESULT_LIMIT,
            exclusions: ExclusionSet::default(),
            base_dir,
        })
    }

    /// Create a configuration and apply `config.toml` from the base
    /// directory when one exists
    pub fn load(base_dir: Option<PathBuf>) -> Result<Self> {
        let config = Self::new(base_dir)?;
        let file_path = config.config_file_path();
        if !file_path.exists() {
            return Ok(config);
        }

        let text = std::fs::read_to_string(&file_path)?;
        config.apply_toml(&text)
    }

    fn apply_toml(mut self, text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;

        if let Some(root) = file.root {
            self.root = root;
        }
        if let Some(db) = file.database_path {
            self.database_path = if db.is_relative() {
                self.base_dir.join(db)
            } else {
                db
            };
        }
        if let Some(batch_size) = file.batch_size {
            self = self.with_batch_size(batch_size)?;
        }
        if let Some(limit) = file.result_limit {
            self.result_limit = limit;
        }
        if let Some(names) = file.exclusions {
            self.exclusions = ExclusionSet::new(names);
        }
        if let Some(extra) = file.extra_exclusions {
            self.exclusions = self.exclusions.extended(extra);
        }

        Ok(self)
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Set the commit cadence; zero is rejected
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE_NAME)
    }

    /// Initialize the configuration directories
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Check if the configuration is already initialized
    pub fn is_initialized(&self) -> bool {
        self.base_dir.exists()
            && self
                .database_path
                .parent()
                .map(Path::exists)
                .unwrap_or(true)
    }
}
