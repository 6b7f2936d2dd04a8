use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::info;

use kbar_sync::api::BrokerClient;
use kbar_sync::data_collector::DataCollector;
use kbar_sync::database;
use kbar_sync::models::{Config, DateWindow};
use kbar_sync::utils::{init_tracing, read_symbols};

/// Minute k-bar ingestor: pulls bars from the broker and upserts them into stock_kbars
#[derive(Parser, Debug)]
#[command(name = "kbar-sync")]
#[command(version)]
#[command(about = "Fetch minute k-bars for a list of symbols and upsert them into stock_kbars")]
#[command(after_help = "
With no dates, today's bars are fetched. One date fetches that day only.

Examples:
  kbar-sync                          # today
  kbar-sync 2024-01-02               # a single day
  kbar-sync 2025-01-01 2025-12-27    # a date range
  kbar-sync 2024-01-02 --symbols tw50.txt
")]
struct Args {
    /// First day to fetch (YYYY-MM-DD). Defaults to today
    start_date: Option<String>,

    /// Last day to fetch (YYYY-MM-DD). Defaults to the start date
    end_date: Option<String>,

    /// Symbol list, one per line. Overrides SYMBOLS_FILE
    #[arg(long, short = 's')]
    symbols: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let window = DateWindow::resolve(
        args.start_date.as_deref(),
        args.end_date.as_deref(),
        Local::now().date_naive(),
    )?;

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(path) = args.symbols {
        config.ingest.symbols_path = path;
    }

    let symbols = read_symbols(&config.ingest.symbols_path)?;
    info!(
        "Loaded {} symbols from {}",
        symbols.len(),
        config.ingest.symbols_path.display()
    );

    let mut client = BrokerClient::new(&config.broker)?;
    let collector = DataCollector::new(config.ingest.clone());

    let summary = collector
        .run(
            &mut client,
            database::open_bar_store(&config.database),
            &symbols,
            &window,
        )
        .await?;

    println!();
    println!("{summary}");
    Ok(())
}
