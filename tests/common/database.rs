//! Throwaway SQLite databases for tests

use std::path::PathBuf;

use tempfile::TempDir;

use kbar_sync::database::{BarStore, Catalog, SqliteStore};
use kbar_sync::models::DatabaseConfig;

/// A SQLite file inside its own temp dir, removed on drop.
pub struct TestDatabase {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TestDatabase {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("kbars.db");
        Self { _dir: dir, path }
    }

    pub fn config(&self) -> DatabaseConfig {
        DatabaseConfig::Sqlite {
            path: self.path.clone(),
        }
    }

    pub async fn connect(&self) -> SqliteStore {
        SqliteStore::connect(&self.path)
            .await
            .expect("Failed to open test database")
    }

    /// Run raw SQL against the database, e.g. to create extra tables.
    pub async fn execute(&self, statements: &[&str]) {
        let mut store = self.connect().await;
        for sql in statements {
            store
                .fetch_text_rows(sql)
                .await
                .unwrap_or_else(|e| panic!("Failed to run {sql}: {e}"));
        }
        BarStore::close(&mut store).await.unwrap();
    }

    pub async fn count_rows(&self) -> i64 {
        let mut store = self.connect().await;
        let count = store
            .fetch_count("SELECT COUNT(*) FROM stock_kbars")
            .await
            .expect("Failed to count rows");
        Catalog::close(&mut store).await.unwrap();
        count
    }

    /// `(symbol, time, close, volume)` ordered by symbol and time, as text.
    pub async fn bars(&self) -> Vec<(String, String, Option<String>, Option<String>)> {
        let mut store = self.connect().await;
        let rows = store
            .fetch_text_rows(
                "SELECT symbol, CAST(time AS TEXT), CAST(close AS TEXT), CAST(volume AS TEXT) \
                 FROM stock_kbars ORDER BY symbol, time",
            )
            .await
            .expect("Failed to read bars");
        Catalog::close(&mut store).await.unwrap();

        rows.into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                (
                    cells.next().flatten().unwrap_or_default(),
                    cells.next().flatten().unwrap_or_default(),
                    cells.next().flatten(),
                    cells.next().flatten(),
                )
            })
            .collect()
    }
}
