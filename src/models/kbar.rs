use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::Value;

use crate::api::exchange_time_from_provider_ts;
use crate::error::{ProviderError, RecordError};

/// Columnar k-bar payload as the broker serializes it. Price and volume cells
/// stay raw JSON so a single bad cell only costs its own row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawKBars {
    #[serde(default)]
    pub ts: Vec<Value>,
    #[serde(rename = "Open", default)]
    pub open: Vec<Value>,
    #[serde(rename = "High", default)]
    pub high: Vec<Value>,
    #[serde(rename = "Low", default)]
    pub low: Vec<Value>,
    #[serde(rename = "Close", default)]
    pub close: Vec<Value>,
    #[serde(rename = "Volume", default)]
    pub volume: Vec<Value>,
}

/// One bar as sent by the broker, cells not yet coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRecord {
    pub ts: Value,
    pub open: Value,
    pub high: Value,
    pub low: Value,
    pub close: Value,
    pub volume: Value,
}

/// A row of `stock_kbars`, unique on `(symbol, time)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub symbol: String,
    pub time: NaiveDateTime,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<i64>,
}

impl RawKBars {
    pub fn len(&self) -> usize {
        self.ts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    /// Transpose the columns into rows.
    pub fn into_records(self) -> Result<Vec<BarRecord>, ProviderError> {
        let rows = self.ts.len();
        for (name, column) in [
            ("Open", &self.open),
            ("High", &self.high),
            ("Low", &self.low),
            ("Close", &self.close),
            ("Volume", &self.volume),
        ] {
            if column.len() != rows {
                return Err(ProviderError::Malformed(format!(
                    "{name} has {} values for {rows} timestamps",
                    column.len()
                )));
            }
        }

        let records = self
            .ts
            .into_iter()
            .zip(self.open)
            .zip(self.high)
            .zip(self.low)
            .zip(self.close)
            .zip(self.volume)
            .map(|(((((ts, open), high), low), close), volume)| BarRecord {
                ts,
                open,
                high,
                low,
                close,
                volume,
            })
            .collect();

        Ok(records)
    }
}

/// Largest magnitude accepted by a `NUMERIC(10,2)` column is 99,999,999.99.
const NUMERIC_10_2_LIMIT: i64 = 100_000_000;

impl PriceBar {
    pub fn from_record(symbol: &str, record: &BarRecord) -> Result<Self, RecordError> {
        Ok(PriceBar {
            symbol: symbol.to_string(),
            time: coerce_time(&record.ts)?,
            open: coerce_price("open", &record.open)?,
            high: coerce_price("high", &record.high)?,
            low: coerce_price("low", &record.low)?,
            close: coerce_price("close", &record.close)?,
            volume: coerce_volume(&record.volume)?,
        })
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn coerce_price(field: &'static str, value: &Value) -> Result<Option<Decimal>, RecordError> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => {
            let text = n.to_string();
            parse_decimal(&text).ok_or(RecordError::OutOfRange { field, value: text })?
        }
        Value::String(s) => parse_decimal(s.trim()).ok_or_else(|| RecordError::InvalidNumber {
            field,
            value: s.clone(),
        })?,
        other => {
            return Err(RecordError::InvalidNumber {
                field,
                value: other.to_string(),
            })
        }
    };

    let rounded = parsed.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.abs() >= Decimal::from(NUMERIC_10_2_LIMIT) {
        return Err(RecordError::OutOfRange {
            field,
            value: rounded.to_string(),
        });
    }
    Ok(Some(rounded))
}

/// Broker nanoseconds to exchange-local time. Integers and integer strings
/// are accepted.
fn coerce_time(value: &Value) -> Result<NaiveDateTime, RecordError> {
    let nanos = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    nanos
        .map(exchange_time_from_provider_ts)
        .ok_or_else(|| RecordError::InvalidTime(value.to_string()))
}

fn coerce_volume(value: &Value) -> Result<Option<i64>, RecordError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                return Ok(Some(v));
            }
            // Fractional volumes are truncated toward zero.
            match n.as_f64() {
                Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(Some(f.trunc() as i64)),
                _ => Err(RecordError::InvalidVolume(n.to_string())),
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| RecordError::InvalidVolume(s.clone())),
        other => Err(RecordError::InvalidVolume(other.to_string())),
    }
}
