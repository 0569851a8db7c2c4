//! # ledgerline CLI
//!
//! Thin orchestration over the reconciliation engine:
//!
//! - `ledgerline run`    — one reconciliation pass (schedule this)
//! - `ledgerline status` — cursor position and output-table size
//! - `ledgerline reset`  — clear caches and cursor together

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ledgerline_core::Money;
use ledgerline_store::{Database, DbConfig};
use ledgerline_sync::{load_rate_book, LedgerClient, ReconciliationEngine, SyncConfig};

#[derive(Parser)]
#[command(name = "ledgerline", version, about = "Incremental payment reconciliation")]
struct Cli {
    /// Path to ledgerline.toml (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one reconciliation pass.
    Run,

    /// Show the sync cursor and output-table size.
    Status,

    /// Clear the persisted caches AND the sync cursor (one unit); the
    /// next run scans the full lookback window. The output table is
    /// untouched — re-processing overwrites rows in place.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("ledgerline v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = SyncConfig::load(cli.config)?;

    match cli.command {
        Command::Run => run(&config).await,
        Command::Status => status(&config).await,
        Command::Reset { yes } => reset(&config, yes).await,
    }
}

async fn open_database(config: &SyncConfig) -> anyhow::Result<Database> {
    if let Some(parent) = config.storage.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let db = Database::new(DbConfig::new(&config.storage.database_path)).await?;
    Ok(db)
}

async fn run(config: &SyncConfig) -> anyhow::Result<()> {
    // A missing credential must fail here, before any window is consumed.
    config.validate()?;

    let db = open_database(config).await?;
    let book = load_rate_book(&config.storage.rate_book_path)?;
    let client = LedgerClient::new(config)?;

    let engine = ReconciliationEngine::new(
        client,
        db,
        book,
        config.commission.policy(),
        config.window.lookback_days,
    );

    let summary = engine.run().await?;
    println!(
        "window {} .. {}",
        summary.window_begin.to_rfc3339(),
        summary.window_end.to_rfc3339()
    );
    println!(
        "fetched {} transaction(s), merged {} row(s), {} missing attribution",
        summary.fetched, summary.merged, summary.missing_attribution
    );
    Ok(())
}

async fn status(config: &SyncConfig) -> anyhow::Result<()> {
    let db = open_database(config).await?;

    match db.state().cursor().await? {
        Some(cursor) => println!("cursor: {}", cursor.to_rfc3339()),
        None => println!(
            "cursor: none (next run scans the last {} days)",
            config.window.lookback_days
        ),
    }
    println!("processed rows: {}", db.rows().count().await?);

    let totals = db.rows().totals().await?;
    println!(
        "total staff commission: {}",
        Money::from_cents(totals.commission_cents).to_decimal_string()
    );
    println!(
        "net business take: {}",
        Money::from_cents(totals.net_take_cents).to_decimal_string()
    );
    Ok(())
}

async fn reset(config: &SyncConfig, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("refusing to reset without --yes (clears caches and the sync cursor)");
    }
    let db = open_database(config).await?;
    db.reset().await?;
    println!("caches and cursor cleared");
    Ok(())
}
