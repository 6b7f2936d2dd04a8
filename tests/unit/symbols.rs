//! Symbol list, date window and configuration inputs

use std::collections::HashMap;
use std::io::Write;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use kbar_sync::error::{ConfigError, IngestError};
use kbar_sync::models::{Config, DatabaseConfig, DateWindow, DEFAULT_BROKER_URL};
use kbar_sync::utils::read_symbols;

use crate::common::test_data;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn test_symbol_file_with_blank_lines() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "2330\n\n   \n2317\n  0050  \n").unwrap();

    assert_eq!(read_symbols(file.path()).unwrap(), test_data::symbols(&["2330", "2317", "0050"]));
}

#[test]
fn test_unreadable_symbol_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_symbols(&dir.path().join("symbols.txt")).unwrap_err();
    assert_matches!(err, IngestError::SymbolFile { .. });
}

#[test]
fn test_window_arguments() {
    let today = test_data::trading_day();
    let single = DateWindow::resolve(Some("2024-01-02"), None, today).unwrap();
    assert_eq!(single.to_string(), "2024-01-02 to 2024-01-02");

    let err = DateWindow::resolve(Some("2024-01-02"), Some("Jan 3"), today).unwrap_err();
    assert_matches!(err, IngestError::InvalidDate { ref value, .. } if value == "Jan 3");
}

#[test]
fn test_config_requires_broker_credentials() {
    let err = Config::from_lookup(lookup(&[("DATABASE_PATH", "kbars.db")])).unwrap_err();
    assert_matches!(err, ConfigError::Missing("API_KEY"));
}

#[test]
fn test_config_postgres_from_env_vars() {
    let config = Config::from_lookup(lookup(&[
        ("API_KEY", "k"),
        ("SECRET_KEY", "s"),
        ("DB_HOST", "db.local"),
        ("DB_NAME", "market"),
        ("DB_USER", "ingest"),
        ("DB_PASSWORD", "hunter2"),
    ]))
    .unwrap();

    assert_eq!(config.broker.base_url, DEFAULT_BROKER_URL);
    assert!(!config.broker.simulation);
    match &config.database {
        DatabaseConfig::Postgres(pg) => {
            assert_eq!(pg.port, 5432);
            assert!(!format!("{pg:?}").contains("hunter2"));
        }
        other => panic!("expected postgres, got {other}"),
    }
    assert_eq!(config.database.to_string(), "PostgreSQL db.local:5432/market");
}
