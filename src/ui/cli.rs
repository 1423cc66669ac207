use clap::{Parser, Subcommand};

/// quickfind - Near-instant filename search for your local disk
#[derive(Parser, Debug)]
#[command(name = "quickfind")]
#[command(about = "Near-instant filename search backed by a local index", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Custom base directory (default: ~/.quickfind)
    #[arg(long, global = true)]
    pub base_dir: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build (or refresh) the index
    Index {
        /// Directory to index (default: configured root, usually your home)
        root: Option<String>,
        /// Upserts per committed batch
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Replace every indexed record; old rows go away with the first committed batch
        #[arg(short, long)]
        force: bool,
    },
    /// Search file names; builds the index first if none exists
    Search {
        /// Substring to look for in file names
        query: String,
        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print extension and modification time with each path
        #[arg(long, conflicts_with = "json")]
        long: bool,
        /// Print results as JSON records
        #[arg(long)]
        json: bool,
        /// Open the N-th result (1-based) with the default application
        #[arg(short, long, value_name = "N")]
        open: Option<usize>,
    },
    /// Open a path with the default application
    Open {
        path: String,
    },
    /// Show where the index lives and how many files it holds
    Status,
}
