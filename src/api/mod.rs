use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};

use crate::error::ProviderError;
use crate::models::{Contract, DateWindow, RawKBars};

pub mod broker_client;
pub use broker_client::BrokerClient;

/// Hours between UTC and the exchange's local clock (Asia/Taipei).
pub const EXCHANGE_UTC_OFFSET_HOURS: i64 = 8;

/// Convert a broker `ts` value into exchange-local wall-clock time.
///
/// The broker sends nanoseconds that, read as UTC, land `EXCHANGE_UTC_OFFSET_HOURS`
/// after the real local bar time. Every bar timestamp must pass through here;
/// if the broker changes its encoding, this is the one place to change.
pub fn exchange_time_from_provider_ts(ts_nanos: i64) -> NaiveDateTime {
    DateTime::from_timestamp_nanos(ts_nanos).naive_utc()
        - chrono::Duration::hours(EXCHANGE_UTC_OFFSET_HOURS)
}

/// Fixed pause between broker requests
pub struct ApiRateLimiter {
    delay: Duration,
}

impl ApiRateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// A market-data session: log in once, resolve symbols, pull bars, log out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KBarProvider: Send + Sync {
    async fn login(&mut self) -> Result<(), ProviderError>;

    /// Fails with [`ProviderError::SymbolNotFound`] for unknown symbols.
    async fn resolve_contract(&self, symbol: &str) -> Result<Contract, ProviderError>;

    async fn kbars(
        &self,
        contract: &Contract,
        window: &DateWindow,
    ) -> Result<RawKBars, ProviderError>;

    async fn logout(&mut self) -> Result<(), ProviderError>;
}
