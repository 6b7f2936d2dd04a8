//! Mock broker gateway built on wiremock

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kbar_sync::models::{BrokerConfig, IngestSettings};

pub struct MockGateway {
    pub server: MockServer,
}

impl MockGateway {
    /// Start a gateway that accepts any login and logout.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "test-token"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Self { server }
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            api_key: "test-key".to_string(),
            secret_key: "test-secret".to_string(),
            base_url: self.server.uri(),
            simulation: true,
        }
    }

    /// No pacing delays, so tests run fast.
    pub fn fast_settings() -> IngestSettings {
        IngestSettings {
            request_delay: Duration::ZERO,
            contracts_wait: Duration::ZERO,
            ..IngestSettings::default()
        }
    }

    pub async fn with_stock(&self, symbol: &str, kbars: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/contracts/stocks/{symbol}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": symbol,
                "exchange": "TSE",
                "name": format!("Stock {symbol}"),
            })))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/kbars"))
            .and(query_param("code", symbol))
            .respond_with(ResponseTemplate::new(200).set_body_json(kbars))
            .mount(&self.server)
            .await;
    }

    pub async fn with_unknown_stock(&self, symbol: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/contracts/stocks/{symbol}")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&self.server)
            .await;
    }
}
