use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Row};
use tracing::debug;

use super::{BarStore, Catalog, ColumnInfo};
use crate::error::StoreError;
use crate::models::{PostgresConfig, PriceBar};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS stock_kbars (
        id SERIAL PRIMARY KEY,
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
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (symbol, time) DO UPDATE SET
        open = EXCLUDED.open,
        high = EXCLUDED.high,
        low = EXCLUDED.low,
        close = EXCLUDED.close,
        volume = EXCLUDED.volume
"#;

/// PostgreSQL backend over a single owned connection
pub struct PgStore {
    conn: Option<PgConnection>,
}

impl PgStore {
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password);

        let conn = PgConnection::connect_with(&options).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.conn.as_mut().ok_or(StoreError::Closed)
    }

    async fn shutdown(&mut self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
            debug!("PostgreSQL connection closed");
        }
        Ok(())
    }
}

#[async_trait]
impl BarStore for PgStore {
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
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
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
impl Catalog for PgStore {
    async fn list_tables(&mut self) -> Result<Vec<String>, StoreError> {
        let tables = sqlx::query_scalar::<_, String>(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(self.conn()?)
        .await?;
        Ok(tables)
    }

    async fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT column_name::text AS column_name, data_type::text AS data_type
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(self.conn()?)
        .await?;

        rows.iter()
            .map(|row| -> Result<ColumnInfo, StoreError> {
                Ok(ColumnInfo {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
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
