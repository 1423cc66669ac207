// Core functionality
pub mod core {
    pub mod config;
    pub mod error;
}

// Data storage
pub mod storage {
    pub mod record;
    pub mod store;
}

// Indexing pipeline
pub mod indexing {
    pub mod bootstrap;
    pub mod builder;
    pub mod exclusion;
    pub mod walker;
}

// Search
pub mod search {
    pub mod dispatch;
    pub mod query;
}

// User interfaces
pub mod ui {
    pub mod cli;
    pub mod open;
}

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::indexing::bootstrap::{build, ensure_index, ensure_index_with, IndexStatus};
pub use crate::indexing::builder::{BuildProgress, BuildReport, IndexBuilder};
pub use crate::indexing::exclusion::ExclusionSet;
pub use crate::indexing::walker::{walk, Walker};
pub use crate::search::dispatch::{spawn_build, SearchDispatcher};
pub use crate::search::query::{search, search_records, DEFAULT_RESULT_LIMIT};
pub use crate::storage::record::FileRecord;
pub use crate::storage::store::{BatchWriter, IndexStore};
pub use crate::ui::cli::Cli;
pub use crate::ui::open::open_path;
