//! Operator tool for a record store directory.
//!
//! Run with: `recordctl [--data-dir DIR] <command>`

mod commands;
mod config;
mod dirs;
mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use record_store::RecordStore;

use commands::{Add, Ids, Recover, ResetAll, ResetField, Restore, Show, Snapshot, Snapshots};

/// Inspect and repair durable records
#[derive(Parser)]
#[command(name = "recordctl")]
#[command(about = "Inspect and repair durable records", long_about = None)]
#[command(version)]
struct Cli {
    /// Store root (defaults to RECORD_STORE_DIR, then the platform data directory)
    #[arg(short, long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// List every known record id
    Ids(Ids),

    /// Print a record
    Show(Show),

    /// Add to a record's balance or a counter
    Add(Add),

    /// Take a snapshot of a record
    Snapshot(Snapshot),

    /// List a record's snapshots
    Snapshots(Snapshots),

    /// Restore a record from a snapshot
    Restore(Restore),

    /// Reset one field of a record to its default
    ResetField(ResetField),

    /// Snapshot and reset every record
    ResetAll(ResetAll),

    /// Run crash recovery and report what it did
    Recover(Recover),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (for RECORD_STORE_DIR and other env vars)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = logging::setup_logging(cli.verbose)?;

    let config = config::from_env(cli.data_dir);
    let root = config.root_dir.clone();

    let store = RecordStore::open(config)
        .await
        .with_context(|| format!("Failed to open record store at {}", root.display()))?;

    let result = match cli.command {
        Command::Ids(cmd) => cmd.execute(&store).await,
        Command::Show(cmd) => cmd.execute(&store).await,
        Command::Add(cmd) => cmd.execute(&store).await,
        Command::Snapshot(cmd) => cmd.execute(&store).await,
        Command::Snapshots(cmd) => cmd.execute(&store).await,
        Command::Restore(cmd) => cmd.execute(&store).await,
        Command::ResetField(cmd) => cmd.execute(&store).await,
        Command::ResetAll(cmd) => cmd.execute(&store).await,
        Command::Recover(cmd) => cmd.execute(&store, &root),
    };

    store
        .shutdown()
        .await
        .context("Failed to flush records on shutdown")?;

    result
}
