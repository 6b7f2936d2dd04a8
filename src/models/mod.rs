use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

mod config;
mod kbar;

pub use config::{
    BrokerConfig, Config, DatabaseConfig, IngestSettings, PostgresConfig, DEFAULT_BROKER_URL,
    DEFAULT_SYMBOLS_FILE,
};
pub use kbar::{BarRecord, PriceBar, RawKBars};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive calendar-date range requested from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// No dates means `today` only, one date means that day only, two dates
    /// are taken as given. The window is not checked for `start <= end`.
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, IngestError> {
        let start = match start {
            Some(value) => parse_date(value)?,
            None => today,
        };
        let end = match end {
            Some(value) => parse_date(value)?,
            None => start,
        };
        Ok(Self { start, end })
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start_str(), self.end_str())
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, IngestError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|source| {
        IngestError::InvalidDate {
            value: value.to_string(),
            source,
        }
    })
}

/// Broker handle for a tradable instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub code: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub name: String,
}

/// What happened to one symbol during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Written { bars: usize, rows: usize },
    NoData,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// Totals for one ingestion run. Not persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub symbols_attempted: usize,
    pub successful_symbols: usize,
    pub empty_symbols: usize,
    pub failed: Vec<FailedSymbol>,
    pub total_rows: usize,
}

impl IngestSummary {
    pub fn record(&mut self, symbol: &str, outcome: SymbolOutcome) {
        self.symbols_attempted += 1;
        match outcome {
            SymbolOutcome::Written { rows, .. } => {
                self.successful_symbols += 1;
                self.total_rows += rows;
            }
            SymbolOutcome::NoData => self.empty_symbols += 1,
            SymbolOutcome::Failed(reason) => self.failed.push(FailedSymbol {
                symbol: symbol.to_string(),
                reason,
            }),
        }
    }

    pub fn failed_symbols(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.symbol.as_str()).collect()
    }
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "Summary")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Total symbols processed: {}", self.symbols_attempted)?;
        writeln!(f, "Successful: {}", self.successful_symbols)?;
        writeln!(f, "No data: {}", self.empty_symbols)?;
        writeln!(f, "Failed: {}", self.failed.len())?;
        if !self.failed.is_empty() {
            writeln!(f, "Failed symbols: {}", self.failed_symbols().join(", "))?;
        }
        writeln!(f, "Total rows inserted/updated: {}", self.total_rows)?;
        write!(f, "{rule}")
    }
}
