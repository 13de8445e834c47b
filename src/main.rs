//! Grid-Harvest main entry point
//!
//! This is the command-line interface for the Grid-Harvest feed harvester.

use anyhow::Context;
use clap::Parser;
use grid_harvest::config::{load_config, Config, ConfigOverrides};
use grid_harvest::output::{load_statistics, print_statistics};
use grid_harvest::run_harvest;
use grid_harvest::storage::EntryStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Grid-Harvest: a resumable feed harvester
///
/// Grid-Harvest walks an account's feed batch by batch, downloads every
/// item's media and checkpoints its progress so an interrupted run picks up
/// where it left off.
#[derive(Parser, Debug)]
#[command(name = "grid-harvest")]
#[command(version)]
#[command(about = "A resumable feed harvester", long_about = None)]
struct Cli {
    /// Account whose feed is harvested
    #[arg(value_name = "USERNAME")]
    username: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Folder that holds one sub-folder per harvested account
    #[arg(short, long, value_name = "SAVE_FOLDER")]
    save_folder: Option<PathBuf>,

    /// Maximum number of items processed at once
    #[arg(short = 'j', long, value_name = "CONCURRENCY")]
    concurrency: Option<usize>,

    /// Ignore the saved snapshot and discover every item again
    #[arg(long, conflicts_with = "stats")]
    fresh: bool,

    /// Show statistics from the saved snapshot and exit
    #[arg(long)]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let overrides = ConfigOverrides {
        save_folder: cli.save_folder.clone(),
        concurrency: cli.concurrency,
    };

    if let Some(path) = &cli.config {
        tracing::info!("Loading configuration from: {}", path.display());
    }
    let config = load_config(cli.config.as_deref(), &cli.username, overrides)
        .context("Failed to load configuration")?;

    if cli.stats {
        handle_stats(&config).await
    } else {
        handle_harvest(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("grid_harvest=info,warn"),
            1 => EnvFilter::new("grid_harvest=debug,info"),
            2 => EnvFilter::new("grid_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows statistics from the saved snapshot
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let database = &config.paths.database;
    if !database.exists() {
        anyhow::bail!("No snapshot found at {}", database.display());
    }

    println!("Snapshot: {}\n", database.display());

    let store = EntryStore::open(database, &config.paths.media).await;
    let stats = load_statistics(&store);
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh harvest (ignoring previous snapshot)");
    } else {
        tracing::info!("Starting harvest (will resume from the saved snapshot)");
    }

    tracing::info!(
        "Harvesting {} from {} with {} workers",
        config.username,
        config.base_url,
        config.concurrency()
    );

    let username = config.username.clone();
    match run_harvest(config, fresh).await {
        Ok(report) => {
            tracing::info!(
                "Harvest of {} finished: {} downloaded, {} failed",
                username,
                report.downloaded,
                report.failed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e).with_context(|| format!("Harvest of {} failed", username))
        }
    }
}
