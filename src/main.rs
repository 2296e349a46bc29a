//! # Couch Seed CLI (`seed`)
//!
//! Loads a directory of JSON sample documents into a Couchbase bucket.
//!
//! ## Usage
//!
//! ```bash
//! seed --config ./config/seed.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `seed scan` | Discover and group input files without touching the cluster |
//! | `seed import` | Provision collections and bulk-load every document type |
//! | `seed status` | List the scopes and collections of the configured bucket |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `couch_seed=info`).

use clap::{Parser, Subcommand};
use couch_seed::config;
use couch_seed::ingest::{self, ImportMode};
use couch_seed::progress::ProgressMode;
use couch_seed::status;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Couch Seed: load JSON sample data into Couchbase, one collection per
/// document type.
#[derive(Parser)]
#[command(name = "seed", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Cluster endpoint, credentials, bucket/scope and import options are
    /// read from this file. The password may instead come from `DB_PASS`.
    #[arg(long, global = true, default_value = "./config/seed.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and group input files.
    ///
    /// Prints files found, types found and documents per type. Does not
    /// contact the cluster.
    Scan {
        /// Override `import.data_dir`.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Import the data directory into the cluster.
    ///
    /// Each document type goes into its own collection under the configured
    /// scope. Missing scopes and collections are created, documents are
    /// upserted in one bulk request per collection, and a primary index is
    /// created. Failures of individual steps are reported, not fatal.
    Import {
        /// Load collections one after another.
        #[arg(long, conflicts_with = "parallel")]
        sequential: bool,

        /// Load all collections concurrently (one task per collection).
        #[arg(long)]
        parallel: bool,

        /// Override `import.data_dir`.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Only scan and group; do not contact the cluster.
        #[arg(long)]
        dry_run: bool,
    },

    /// List the scopes and collections of the configured bucket.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("couch_seed=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Scan { data_dir } => {
            if let Some(dir) = data_dir {
                cfg.import.data_dir = dir;
            }
            ingest::run_scan(&cfg, progress.as_ref())?;
        }
        Commands::Import {
            sequential,
            parallel,
            data_dir,
            dry_run,
        } => {
            if let Some(dir) = data_dir {
                cfg.import.data_dir = dir;
            }
            let mode = if sequential {
                ImportMode::Sequential
            } else if parallel {
                ImportMode::Parallel
            } else {
                ImportMode::from_flag(cfg.import.parallel)
            };
            ingest::run_import(&cfg, mode, dry_run, progress).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
    }

    Ok(())
}
