//! Print the tables, columns and basic statistics of the k-bar database.
//!
//! Read-only. Connection or query failures are printed to stdout like the
//! report itself, and the process still exits normally.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use kbar_sync::database::{open_catalog, Catalog};
use kbar_sync::models::DatabaseConfig;
use kbar_sync::schema_report::{SchemaReport, SchemaReporter, DEFAULT_MARKER, DEFAULT_SAMPLE_LIMIT};
use kbar_sync::utils::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "inspect-schema")]
#[command(version)]
#[command(about = "Inspect k-bar tables: columns, row counts, date ranges and latest rows")]
struct Args {
    /// Case-insensitive substring selecting the tables to inspect
    #[arg(long, short = 'm', default_value = DEFAULT_MARKER)]
    marker: String,

    /// Number of latest rows shown per table
    #[arg(long, short = 'n', default_value_t = DEFAULT_SAMPLE_LIMIT)]
    sample_limit: usize,
}

async fn inspect(args: &Args) -> Result<SchemaReport> {
    let config = DatabaseConfig::from_env().context("failed to load database configuration")?;
    let mut catalog = open_catalog(&config)
        .await
        .with_context(|| format!("failed to connect to {config}"))?;

    let reporter = SchemaReporter::new(&args.marker, args.sample_limit);
    let report = reporter.build(catalog.as_mut()).await;

    if let Err(e) = catalog.close().await {
        warn!("Failed to close database connection: {}", e);
    }
    Ok(report?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    println!("{}", render(&inspect(&args).await));
    Ok(())
}

fn render(outcome: &Result<SchemaReport>) -> String {
    match outcome {
        Ok(report) => report.to_string(),
        Err(e) => format!("Error: {e:?}"),
    }
}
