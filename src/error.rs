use std::path::PathBuf;

use thiserror::Error;

/// Problems building [`crate::models::Config`] from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable required")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot read symbol file {}: {source}", path.display())]
    SymbolFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid date {value:?}, expected YYYY-MM-DD")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("broker login failed: {0}")]
    ProviderLogin(#[source] ProviderError),

    #[error("database error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by a [`crate::api::KBarProvider`]. The collector treats every
/// variant as a per-symbol failure once the session is established.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("symbol {0} not found in contracts")]
    SymbolNotFound(String),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("broker returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid broker url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A single bar that cannot be coerced into a table row.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("{field} is not numeric: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("timestamp is not integer nanoseconds: {0}")]
    InvalidTime(String),

    #[error("volume is not an integer: {0}")]
    InvalidVolume(String),

    #[error("{field} value {value} does not fit NUMERIC(10,2)")]
    OutOfRange { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error("connection already closed")]
    Closed,
}
