use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Row};
use tracing::debug;

use super::{BarStore, Catalog, ColumnInfo};
use crate::error::StoreError;
use crate::models::PriceBar;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS stock_kbars (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol VARCHAR(20) NOT NULL,
        time TIMESTAMP NOT NULL,
        open NUMERIC(10, 2),
        high NUMERIC(10, 2),
        low NUMERIC(10, 2),
        close NUMERIC(10, 2),
        volume BIGINT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(symbol, time)
    )
"#;

const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_stock_kbars_symbol ON stock_kbars(symbol)",
    "CREATE INDEX IF NOT EXISTS idx_stock_kbars_time ON stock_kbars(time)",
    "CREATE INDEX IF NOT EXISTS idx_stock_kbars_symbol_time ON stock_kbars(symbol, time)",
];

const UPSERT_BAR: &str = r#"
    INSERT INTO stock_kbars (symbol, time, open, high, low, close, volume)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT (symbol, time) DO UPDATE SET
        open = excluded.open,
        high = excluded.high,
        low = excluded.low,
        close = excluded.close,
        volume = excluded.volume
"#;

/// SQLite backend for local runs and tests. Same table shape as Postgres.
///
/// Prices are bound as decimal text, but NUMERIC affinity turns them into
/// INTEGER or REAL (an f64), so the stored value is only exact up to what an
/// f64 holds. Values already rounded to two decimals read back unchanged when
/// parsed as `Decimal`; use Postgres where exact NUMERIC storage matters.
pub struct SqliteStore {
    conn: Option<SqliteConnection>,
}

impl SqliteStore {
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let conn = SqliteConnection::connect_with(&options).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection, StoreError> {
        self.conn.as_mut().ok_or(StoreError::Closed)
    }

    async fn shutdown(&mut self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
            debug!("SQLite connection closed");
        }
        Ok(())
    }
}

#[async_trait]
impl BarStore for SqliteStore {
    async fn ensure_schema(&mut self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        sqlx::query(CREATE_TABLE).execute(&mut *conn).await?;
        for statement in CREATE_INDEXES {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        Ok(())
    }

    async fn upsert_bar(&mut self, bar: &PriceBar) -> Result<(), StoreError> {
        let conn = self.conn()?;
        sqlx::query(UPSERT_BAR)
            .bind(&bar.symbol)
            .bind(bar.time)
            .bind(bar.open.map(|d| d.to_string()))
            .bind(bar.high.map(|d| d.to_string()))
            .bind(bar.low.map(|d| d.to_string()))
            .bind(bar.close.map(|d| d.to_string()))
            .bind(bar.volume)
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.shutdown().await
    }
}

#[async_trait]
impl Catalog for SqliteStore {
    async fn list_tables(&mut self) -> Result<Vec<String>, StoreError> {
        let tables = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(self.conn()?)
        .await?;
        Ok(tables)
    }

    async fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
        let rows = sqlx::query("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table)
            .fetch_all(self.conn()?)
            .await?;

        rows.iter()
            .map(|row| -> Result<ColumnInfo, StoreError> {
                Ok(ColumnInfo {
                    name: row.try_get("name")?,
                    data_type: row.try_get::<String, _>("type")?.to_lowercase(),
                })
            })
            .collect()
    }

    async fn fetch_count(&mut self, sql: &str) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(self.conn()?)
            .await?)
    }

    async fn fetch_text_rows(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, StoreError> {
        let rows = sqlx::query(sql).fetch_all(self.conn()?).await?;
        rows.iter()
            .map(|row| -> Result<Vec<Option<String>>, StoreError> {
                (0..row.len())
                    .map(|i| row.try_get::<Option<String>, _>(i).map_err(StoreError::from))
                    .collect()
            })
            .collect()
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.shutdown().await
    }
}
