use std::future::Future;

use tracing::{debug, error, info, warn};

use crate::api::{ApiRateLimiter, KBarProvider};
use crate::database::{upsert_bars, BarStore};
use crate::error::{IngestError, ProviderError, StoreError};
use crate::models::{DateWindow, IngestSettings, IngestSummary, SymbolOutcome};

/// Pulls k-bars for a list of symbols and upserts them into the bar store.
///
/// One broker session and one store connection serve the whole run. Symbols
/// are processed strictly in order; a failing symbol is recorded in the
/// summary and the loop moves on.
pub struct DataCollector {
    settings: IngestSettings,
    rate_limiter: ApiRateLimiter,
}

impl DataCollector {
    pub fn new(settings: IngestSettings) -> Self {
        let rate_limiter = ApiRateLimiter::new(settings.request_delay);
        Self {
            settings,
            rate_limiter,
        }
    }

    /// Run a full ingestion pass.
    ///
    /// The store is opened only after a successful login. Whatever happens
    /// after that, the store is closed and the session is logged out before
    /// returning.
    pub async fn run<P, F>(
        &self,
        provider: &mut P,
        open_store: F,
        symbols: &[String],
        window: &DateWindow,
    ) -> Result<IngestSummary, IngestError>
    where
        P: KBarProvider + ?Sized,
        F: Future<Output = Result<Box<dyn BarStore>, StoreError>>,
    {
        if window.is_inverted() {
            warn!("Start date is after end date ({}); the broker will likely return no bars", window);
        }

        provider.login().await.map_err(IngestError::ProviderLogin)?;
        info!("✓ Logged in to broker");

        if !self.settings.contracts_wait.is_zero() {
            debug!("Waiting {:?} for contracts to load", self.settings.contracts_wait);
            tokio::time::sleep(self.settings.contracts_wait).await;
        }

        let mut store = match open_store.await {
            Ok(store) => store,
            Err(e) => {
                Self::logout(provider).await;
                return Err(e.into());
            }
        };

        let result = self.collect(provider, store.as_mut(), symbols, window).await;

        if let Err(e) = store.close().await {
            warn!("Failed to close database connection: {}", e);
        } else {
            info!("✓ Database connection closed");
        }
        Self::logout(provider).await;

        result
    }

    async fn logout<P: KBarProvider + ?Sized>(provider: &mut P) {
        match provider.logout().await {
            Ok(()) => info!("✓ Logged out from broker"),
            Err(e) => warn!("Broker logout failed: {}", e),
        }
    }

    async fn collect<P: KBarProvider + ?Sized>(
        &self,
        provider: &P,
        store: &mut dyn BarStore,
        symbols: &[String],
        window: &DateWindow,
    ) -> Result<IngestSummary, IngestError> {
        store.ensure_schema().await?;
        info!("✓ Table stock_kbars ready");

        info!("Fetching data for {} symbols from {}", symbols.len(), window);

        let mut summary = IngestSummary::default();
        let total = symbols.len();

        for (i, symbol) in symbols.iter().enumerate() {
            info!("[{}/{}] Processing {}...", i + 1, total, symbol);

            let outcome = match self.process_symbol(provider, store, symbol, window).await {
                Ok(outcome) => outcome,
                Err(ProviderError::SymbolNotFound(_)) => {
                    error!("  ✗ Symbol {} not found in contracts", symbol);
                    SymbolOutcome::Failed("not found in contracts".to_string())
                }
                Err(e) => {
                    error!("  ✗ Error processing {}: {}", symbol, e);
                    SymbolOutcome::Failed(e.to_string())
                }
            };

            match &outcome {
                SymbolOutcome::Written { bars, rows } => {
                    info!("  ✓ Inserted/updated {} of {} records for {}", rows, bars, symbol)
                }
                SymbolOutcome::NoData => warn!("  No data returned for {}", symbol),
                SymbolOutcome::Failed(_) => {}
            }
            summary.record(symbol, outcome);
        }

        Ok(summary)
    }

    async fn process_symbol<P: KBarProvider + ?Sized>(
        &self,
        provider: &P,
        store: &mut dyn BarStore,
        symbol: &str,
        window: &DateWindow,
    ) -> Result<SymbolOutcome, ProviderError> {
        let contract = provider.resolve_contract(symbol).await?;

        let fetched = provider.kbars(&contract, window).await;
        self.rate_limiter.wait().await;
        let raw = fetched?;

        if raw.is_empty() {
            return Ok(SymbolOutcome::NoData);
        }

        let records = raw.into_records()?;
        debug!("  Fetched {} records for {}", records.len(), symbol);
        let rows = upsert_bars(store, symbol, &records).await;

        Ok(SymbolOutcome::Written {
            bars: records.len(),
            rows,
        })
    }
}
