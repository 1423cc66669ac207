use clap::Parser;
use quickfind::core::error::Result;
use quickfind::ui::cli::{Cli, Commands};
use quickfind::{ensure_index_with, open_path, search_records, Config, IndexBuilder, IndexStatus, IndexStore};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = Config::load(cli.base_dir.as_deref().map(PathBuf::from))?;

    match cli.command {
        Commands::Index { root, batch_size, force } => handle_index(config, root, batch_size, force),
        Commands::Search { query, limit, long, json, open } => {
            handle_search(&config, &query, limit, long, json, open)
        }
        Commands::Open { path } => handle_open(Path::new(&path)),
        Commands::Status => handle_status(&config),
    }
}

fn init_logging() {
    // Logs go to stderr so search output stays pipeable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quickfind=info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn handle_index(
    mut config: Config,
    root: Option<String>,
    batch_size: Option<usize>,
    force: bool,
) -> Result<()> {
    if let Some(root) = root {
        config = config.with_root(root);
    }
    if let Some(batch_size) = batch_size {
        config = config.with_batch_size(batch_size)?;
    }
    config.init()?;

    println!("Indexing files under: {}", config.root.display());

    let builder = IndexBuilder::from_config(&config).replace_existing(force);
    let records = builder.walk(&config.root)?;
    let mut store = IndexStore::open(&config.database_path)?;
    if force {
        println!("Replacing existing index...");
    }

    let report = builder.build_from(records, &mut store, |progress| {
        println!("  Indexed {} files so far...", progress.files_indexed);
    })?;

    println!("\nIndexing complete!");
    println!("  Files indexed: {}", report.files_indexed);
    println!("  Batches committed: {}", report.commits);
    if report.walk.directories_pruned > 0 {
        println!("  Excluded directories: {}", report.walk.directories_pruned);
    }
    if report.walk.entries_skipped > 0 {
        println!("  Skipped (inaccessible): {}", report.walk.entries_skipped);
    }
    println!("  Time: {:.2}s", report.elapsed.as_secs_f64());
    println!("  Index: {}", config.database_path.display());

    Ok(())
}

fn handle_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    long: bool,
    json: bool,
    open: Option<usize>,
) -> Result<()> {
    let builder = IndexBuilder::from_config(config);
    if let IndexStatus::Built(report) = ensure_index_with(&config.root, &config.database_path, &builder)? {
        eprintln!(
            "Built a new index of {} files under {}",
            report.files_indexed,
            report.root.display()
        );
    }

    let store = IndexStore::open_existing(&config.database_path)?;
    let records = search_records(&store, query, limit.unwrap_or(config.result_limit))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No files matching \"{}\".", query);
    } else {
        for (i, record) in records.iter().enumerate() {
            if long {
                println!(
                    "{:>3}. {}  [{}] {:.0}",
                    i + 1,
                    record.path,
                    if record.extension.is_empty() { "-" } else { record.extension.as_str() },
                    record.modified_time
                );
            } else {
                println!("{:>3}. {}", i + 1, record.path);
            }
        }
    }

    if let Some(n) = open {
        match n.checked_sub(1).and_then(|i| records.get(i)) {
            Some(record) => {
                if !open_path(Path::new(&record.path)) {
                    eprintln!("Could not open {}", record.path);
                }
            }
            None => eprintln!("No result number {} to open ({} results).", n, records.len()),
        }
    }

    Ok(())
}

fn handle_open(path: &Path) -> Result<()> {
    if !open_path(path) {
        eprintln!("Could not open {}", path.display());
    }
    Ok(())
}

fn handle_status(config: &Config) -> Result<()> {
    println!("Index: {}", config.database_path.display());
    println!("Root: {}", config.root.display());

    if !IndexStore::probe(&config.database_path)? {
        println!("Status: not built (run 'quickfind index' or any search)");
        return Ok(());
    }

    let store = IndexStore::open_existing(&config.database_path)?;
    println!("Status: ready");
    println!("Files: {}", store.count()?);
    println!(
        "Excluded directory names: {}",
        config.exclusions.iter().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}
