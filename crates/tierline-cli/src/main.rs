//! Tierline CLI (tierctl)
//!
//! Command-line tool for driving a local tierline deployment: a
//! SQLite-backed primary store and location index plus a filesystem
//! archive.
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a record
//! tierctl put R1 --partition-key acct-1 --value '{"amount": 42}'
//!
//! # Read it back (tier-transparent)
//! tierctl get R1
//!
//! # Preview what a migration run would move
//! tierctl migrate run --dry-run --cutoff-days 90
//!
//! # Actually migrate
//! tierctl migrate run --cutoff-days 90
//!
//! # Where does a record live now?
//! tierctl index lookup R1
//! ```
//!
//! ## Configuration
//!
//! Backends are selected with flags or environment variables:
//! - `TIERLINE_PRIMARY_DB`: primary store SQLite file
//! - `TIERLINE_INDEX_DB`: location index SQLite file
//! - `TIERLINE_ARCHIVE_DIR`: archive root directory
//!
//! Logging follows `RUST_LOG` (e.g. `RUST_LOG=tierline_migrate=debug`).

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use tierline_core::{Record, Tier};
use tierline_index::{LocationIndex, SqliteLocationIndex};
use tierline_migrate::{MigrationConfig, MigrationOrchestrator};
use tierline_storage::{
    ArchiveReader, PrimaryStore, ReadConfig, ReadOutcome, ReadRouter, SqlitePrimaryStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Job identifier for the scheduled migration; a single-job deployment
/// always uses this.
const DEFAULT_JOB_ID: &str = "tiering";

#[derive(Parser)]
#[command(name = "tierctl")]
#[command(about = "Tierline command-line tool", long_about = None)]
struct Cli {
    /// Primary store SQLite file
    #[arg(
        long,
        env = "TIERLINE_PRIMARY_DB",
        default_value = "tierline-primary.db"
    )]
    primary_db: String,

    /// Location index SQLite file
    #[arg(long, env = "TIERLINE_INDEX_DB", default_value = "tierline-index.db")]
    index_db: String,

    /// Archive root directory
    #[arg(long, env = "TIERLINE_ARCHIVE_DIR", default_value = "tierline-archive")]
    archive_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a record to the primary store
    Put {
        /// Record identifier
        id: String,
        /// Partition key
        #[arg(short, long)]
        partition_key: String,
        /// Event timestamp in milliseconds since epoch (default: now)
        #[arg(short, long)]
        timestamp: Option<i64>,
        /// Record payload (JSON string)
        #[arg(short, long)]
        value: String,
    },
    /// Read a record from whichever tier holds it
    Get {
        /// Record identifier
        id: String,
        /// Timestamp hint for archive path reconstruction when the
        /// index has no entry
        #[arg(short, long)]
        timestamp_hint: Option<i64>,
    },
    /// Location index commands
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },
    /// Migration commands
    Migrate {
        #[command(subcommand)]
        command: MigrateCommands,
    },
}

#[derive(Subcommand)]
enum IndexCommands {
    /// Show the index entry for a record
    Lookup {
        /// Record identifier
        id: String,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run one migration pass over the primary store
    Run {
        /// Report the eligible set without mutating any store
        #[arg(long)]
        dry_run: bool,
        /// Age threshold in days
        #[arg(long)]
        cutoff_days: Option<u64>,
        /// Records per scan page
        #[arg(long)]
        page_size: Option<usize>,
        /// Worker pool size
        #[arg(long)]
        workers: Option<usize>,
        /// Attempts for transient archive failures
        #[arg(long)]
        max_retries: Option<u32>,
    },
}

/// The wired-up local deployment.
struct Backends {
    primary: Arc<dyn PrimaryStore>,
    index: Arc<dyn LocationIndex>,
    archive: Arc<dyn ObjectStore>,
}

impl Backends {
    async fn open(cli: &Cli) -> Result<Self> {
        let primary = SqlitePrimaryStore::new(&cli.primary_db)
            .await
            .with_context(|| format!("Failed to open primary store at {}", cli.primary_db))?;

        let index = SqliteLocationIndex::new(&cli.index_db)
            .await
            .with_context(|| format!("Failed to open location index at {}", cli.index_db))?;

        std::fs::create_dir_all(&cli.archive_dir)
            .with_context(|| format!("Failed to create archive directory {}", cli.archive_dir))?;
        let archive = LocalFileSystem::new_with_prefix(&cli.archive_dir)
            .with_context(|| format!("Failed to open archive at {}", cli.archive_dir))?;

        Ok(Self {
            primary: Arc::new(primary),
            index: Arc::new(index),
            archive: Arc::new(archive),
        })
    }

    fn router(&self) -> ReadRouter {
        ReadRouter::new(
            Arc::clone(&self.primary),
            Arc::clone(&self.index),
            ArchiveReader::new(Arc::clone(&self.archive)),
            ReadConfig::default(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let backends = Backends::open(&cli).await?;

    match &cli.command {
        Commands::Put {
            id,
            partition_key,
            timestamp,
            value,
        } => {
            let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
            let record = Record::new(
                id.clone(),
                partition_key.clone(),
                timestamp,
                Bytes::from(value.clone()),
            );

            backends
                .router()
                .put(record)
                .await
                .context("Failed to write record")?;

            println!("✅ Record written:");
            println!("  Id: {}", id);
            println!("  Partition key: {}", partition_key);
            println!("  Timestamp: {}", timestamp);
        }
        Commands::Get { id, timestamp_hint } => {
            let outcome = backends
                .router()
                .get(id, *timestamp_hint)
                .await
                .context("Failed to read record")?;

            match outcome {
                ReadOutcome::Hit(record) => print_record(&record)?,
                ReadOutcome::NotFound => println!("Record not found: {}", id),
            }
        }
        Commands::Index { command } => match command {
            IndexCommands::Lookup { id } => {
                let entry = backends
                    .index
                    .lookup(id)
                    .await
                    .context("Failed to look up index entry")?;

                match entry {
                    Some(entry) => {
                        println!("Record: {}", entry.record_id);
                        println!("  Tier: {}", entry.tier);
                        if let Some(path) = &entry.archive_path {
                            println!("  Archive path: {}", path);
                        }
                        if entry.tier == Tier::Cold {
                            println!("  Migrated at: {}", entry.updated_at);
                        }
                    }
                    None => println!("No index entry for: {} (record is hot or absent)", id),
                }
            }
        },
        Commands::Migrate { command } => match command {
            MigrateCommands::Run {
                dry_run,
                cutoff_days,
                page_size,
                workers,
                max_retries,
            } => {
                let mut config = MigrationConfig {
                    dry_run: *dry_run,
                    ..MigrationConfig::default()
                };
                if let Some(days) = cutoff_days {
                    config.cutoff_days = *days;
                }
                if let Some(size) = page_size {
                    config.page_size = *size;
                }
                if let Some(count) = workers {
                    config.worker_concurrency = *count;
                }
                if let Some(attempts) = max_retries {
                    config.max_retries = *attempts;
                }

                let orchestrator = MigrationOrchestrator::new(
                    Arc::clone(&backends.primary),
                    Arc::clone(&backends.index),
                    Arc::clone(&backends.archive),
                    DEFAULT_JOB_ID,
                    config,
                );

                info!(
                    job_id = DEFAULT_JOB_ID,
                    primary_db = %cli.primary_db,
                    index_db = %cli.index_db,
                    archive_dir = %cli.archive_dir,
                    "Starting migration run"
                );
                let report = orchestrator.run().await.context("Migration run failed")?;
                info!(
                    run_id = %report.run_id,
                    migrated = report.migrated,
                    skipped = report.skipped,
                    "Migration run returned"
                );

                if report.dry_run {
                    println!("🔍 Dry run (no stores were modified):");
                } else {
                    println!("✅ Migration run complete:");
                }
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        },
    }

    Ok(())
}

fn print_record(record: &Record) -> Result<()> {
    println!("Record: {}", record.id);
    println!("  Partition key: {}", record.partition_key);
    println!("  Timestamp: {}", record.timestamp);

    match std::str::from_utf8(&record.payload) {
        Ok(value) => {
            // Try to pretty-print as JSON
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(value) {
                println!("  Payload: {}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("  Payload: {}", value);
            }
        }
        Err(_) => println!("  Payload: {} bytes (binary)", record.payload.len()),
    }

    Ok(())
}
