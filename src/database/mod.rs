use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::models::{BarRecord, DatabaseConfig, PriceBar};

pub mod postgres;
pub mod sqlite;

pub use postgres::PgStore;
pub use sqlite::SqliteStore;

/// Persistent k-bar table. One owned connection per store; `close` releases it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BarStore: Send {
    /// Create `stock_kbars` and its indexes if they are missing.
    async fn ensure_schema(&mut self) -> Result<(), StoreError>;

    /// Insert the bar, or overwrite prices and volume of the row with the same
    /// `(symbol, time)`. `id` and `created_at` of an existing row are kept.
    async fn upsert_bar(&mut self, bar: &PriceBar) -> Result<(), StoreError>;

    async fn close(&mut self) -> Result<(), StoreError>;
}

/// Column name and declared type, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// Read-only catalog and ad-hoc query access for the schema reporter.
#[async_trait]
pub trait Catalog: Send {
    async fn list_tables(&mut self) -> Result<Vec<String>, StoreError>;

    async fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, StoreError>;

    /// Run a query returning a single integer.
    async fn fetch_count(&mut self, sql: &str) -> Result<i64, StoreError>;

    /// Run a query whose columns are all text (or NULL).
    async fn fetch_text_rows(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, StoreError>;

    async fn close(&mut self) -> Result<(), StoreError>;
}

pub async fn open_bar_store(config: &DatabaseConfig) -> Result<Box<dyn BarStore>, StoreError> {
    let store: Box<dyn BarStore> = match config {
        DatabaseConfig::Postgres(pg) => Box::new(PgStore::connect(pg).await?),
        DatabaseConfig::Sqlite { path } => Box::new(SqliteStore::connect(path).await?),
    };
    info!("✓ Connected to {}", config);
    Ok(store)
}

pub async fn open_catalog(config: &DatabaseConfig) -> Result<Box<dyn Catalog>, StoreError> {
    let catalog: Box<dyn Catalog> = match config {
        DatabaseConfig::Postgres(pg) => Box::new(PgStore::connect(pg).await?),
        DatabaseConfig::Sqlite { path } => Box::new(SqliteStore::connect(path).await?),
    };
    info!("✓ Connected to {}", config);
    Ok(catalog)
}

/// Coerce and upsert every record for `symbol`, returning how many rows were
/// written. Bad records and failed statements are logged and skipped.
pub async fn upsert_bars<S>(store: &mut S, symbol: &str, records: &[BarRecord]) -> usize
where
    S: BarStore + ?Sized,
{
    let mut written = 0;
    for record in records {
        let bar = match PriceBar::from_record(symbol, record) {
            Ok(bar) => bar,
            Err(e) => {
                warn!("  Error inserting row for {} at {}: {}", symbol, record.ts, e);
                continue;
            }
        };

        match store.upsert_bar(&bar).await {
            Ok(()) => written += 1,
            Err(e) => warn!("  Error inserting row for {} at {}: {}", symbol, record.ts, e),
        }
    }
    written
}
