use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BROKER_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_SYMBOLS_FILE: &str = "symbols.txt";
pub const DEFAULT_PG_PORT: u16 = 5432;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;
pub const DEFAULT_CONTRACTS_WAIT_MS: u64 = 2000;

/// Configuration for the ingestion job, built once at startup and passed by
/// reference to the broker client, the store and the collector.
#[derive(Debug, Clone)]
pub struct Config {
    pub broker: BrokerConfig,
    pub database: DatabaseConfig,
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub simulation: bool,
}

/// Where bars are written. Postgres is the production target; a SQLite file
/// is used when `DATABASE_PATH` is set.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseConfig {
    Postgres(PostgresConfig),
    Sqlite { path: PathBuf },
}

#[derive(Clone, PartialEq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub symbols_path: PathBuf,
    /// Pause after every bar request.
    pub request_delay: Duration,
    /// Pause after login while the broker loads its contract list.
    pub contracts_wait: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            symbols_path: PathBuf::from(DEFAULT_SYMBOLS_FILE),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            contracts_wait: Duration::from_millis(DEFAULT_CONTRACTS_WAIT_MS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if it exists
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            broker: BrokerConfig::from_lookup(&lookup)?,
            database: DatabaseConfig::from_lookup(&lookup)?,
            ingest: IngestSettings {
                symbols_path: lookup_non_empty(&lookup, "SYMBOLS_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SYMBOLS_FILE)),
                request_delay: Duration::from_millis(parse_or(
                    &lookup,
                    "REQUEST_DELAY_MS",
                    DEFAULT_REQUEST_DELAY_MS,
                )?),
                contracts_wait: Duration::from_millis(parse_or(
                    &lookup,
                    "CONTRACTS_WAIT_MS",
                    DEFAULT_CONTRACTS_WAIT_MS,
                )?),
            },
        })
    }
}

impl BrokerConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(BrokerConfig {
            api_key: required(lookup, "API_KEY")?,
            secret_key: required(lookup, "SECRET_KEY")?,
            base_url: lookup_non_empty(lookup, "BROKER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BROKER_URL.to_string()),
            simulation: parse_or(lookup, "BROKER_SIMULATION", false)?,
        })
    }
}

impl DatabaseConfig {
    /// Database settings only; the schema reporter needs no broker credentials.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup_non_empty(lookup, "DATABASE_PATH") {
            return Ok(DatabaseConfig::Sqlite {
                path: PathBuf::from(path),
            });
        }

        Ok(DatabaseConfig::Postgres(PostgresConfig {
            host: required(lookup, "DB_HOST")?,
            port: parse_or(lookup, "DB_PORT", DEFAULT_PG_PORT)?,
            name: required(lookup, "DB_NAME")?,
            user: required(lookup, "DB_USER")?,
            password: required(lookup, "DB_PASSWORD")?,
        }))
    }
}

impl fmt::Display for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseConfig::Postgres(pg) => {
                write!(f, "PostgreSQL {}:{}/{}", pg.host, pg.port, pg.name)
            }
            DatabaseConfig::Sqlite { path } => write!(f, "SQLite {}", path.display()),
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

fn lookup_non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).filter(|value| !value.trim().is_empty())
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_non_empty(lookup, var).ok_or(ConfigError::Missing(var))
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup_non_empty(lookup, var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
