use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::KBarProvider;
use crate::error::ProviderError;
use crate::models::{BrokerConfig, Contract, DateWindow, RawKBars};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    api_key: &'a str,
    secret_key: &'a str,
    simulation: bool,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// JSON-over-HTTP client for the broker's market-data gateway
pub struct BrokerClient {
    client: Client,
    base_url: Url,
    api_key: String,
    secret_key: String,
    simulation: bool,
    token: Option<String>,
}

impl BrokerClient {
    pub fn new(config: &BrokerConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("kbar-sync/0.1")
            .build()?;

        // A trailing slash keeps `Url::join` from dropping the last path segment.
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            simulation: config.simulation,
            token: None,
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        Ok(self.base_url.join(path)?)
    }

    fn bearer(&self) -> Result<&str, ProviderError> {
        self.token.as_deref().ok_or(ProviderError::NotLoggedIn)
    }

    async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                ProviderError::Malformed(e.to_string())
            } else {
                ProviderError::Http(e)
            }
        })
    }
}

#[async_trait]
impl KBarProvider for BrokerClient {
    async fn login(&mut self) -> Result<(), ProviderError> {
        let url = self.endpoint("login")?;
        let request = LoginRequest {
            api_key: &self.api_key,
            secret_key: &self.secret_key,
            simulation: self.simulation,
        };

        let response = self.client.post(url).json(&request).send().await?;
        let login: LoginResponse = Self::decode(Self::ensure_success(response).await?).await?;

        self.token = Some(login.token);
        info!("Logged in to broker at {} (simulation: {})", self.base_url, self.simulation);
        Ok(())
    }

    async fn resolve_contract(&self, symbol: &str) -> Result<Contract, ProviderError> {
        let mut url = self.endpoint("contracts/stocks/")?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Malformed(format!("base url {} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .push(symbol);

        let response = self
            .client
            .get(url)
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::SymbolNotFound(symbol.to_string()));
        }
        Self::decode(Self::ensure_success(response).await?).await
    }

    async fn kbars(
        &self,
        contract: &Contract,
        window: &DateWindow,
    ) -> Result<RawKBars, ProviderError> {
        let url = self.endpoint("kbars")?;
        let start = window.start_str();
        let end = window.end_str();

        debug!("Requesting kbars for {} from {} to {}", contract.code, start, end);

        let response = self
            .client
            .get(url)
            .bearer_auth(self.bearer()?)
            .query(&[
                ("code", contract.code.as_str()),
                ("exchange", contract.exchange.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ])
            .send()
            .await?;

        let bars: RawKBars = Self::decode(Self::ensure_success(response).await?).await?;
        debug!("Received {} kbars for {}", bars.len(), contract.code);
        Ok(bars)
    }

    async fn logout(&mut self) -> Result<(), ProviderError> {
        let Some(token) = self.token.take() else {
            return Ok(());
        };

        let url = self.endpoint("logout")?;
        let response = self.client.post(url).bearer_auth(token).send().await?;
        Self::ensure_success(response).await?;
        info!("Logged out of broker");
        Ok(())
    }
}
