//! End-to-end ingestion: mock gateway -> BrokerClient -> DataCollector -> SQLite

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use kbar_sync::api::BrokerClient;
use kbar_sync::data_collector::DataCollector;
use kbar_sync::database;
use kbar_sync::error::IngestError;
use kbar_sync::models::{DateWindow, IngestSummary};

use crate::common::test_data::{self, MINUTE_NANOS, TS_0901_LOCAL};
use crate::common::{logging, MockGateway, TestDatabase};

fn day_window() -> DateWindow {
    DateWindow::new(test_data::trading_day(), test_data::trading_day())
}

async fn ingest(gateway: &MockGateway, db: &TestDatabase, symbols: &[&str]) -> IngestSummary {
    let mut client = BrokerClient::new(&gateway.broker_config()).unwrap();
    DataCollector::new(MockGateway::fast_settings())
        .run(
            &mut client,
            database::open_bar_store(&db.config()),
            &test_data::symbols(symbols),
            &day_window(),
        )
        .await
        .expect("ingestion run failed")
}

fn decimal(text: &Option<String>) -> Decimal {
    text.as_deref().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_known_and_unknown_symbol() {
    logging::init_test_logging();
    logging::log_test_step("One valid bar for 2330, 9999NOTFOUND missing from contracts");

    let gateway = MockGateway::start().await;
    gateway
        .with_stock("2330", test_data::kbars_payload(&[(TS_0901_LOCAL, 586.0, 1520)]))
        .await;
    gateway.with_unknown_stock("9999NOTFOUND").await;

    let db = TestDatabase::new();
    let summary = ingest(&gateway, &db, &["2330", "9999NOTFOUND"]).await;

    assert_eq!(summary.symbols_attempted, 2);
    assert_eq!(summary.successful_symbols, 1);
    assert_eq!(summary.total_rows, 1);
    assert_eq!(summary.failed_symbols(), vec!["9999NOTFOUND"]);

    let bars = db.bars().await;
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].0, "2330");
    assert_eq!(bars[0].1, "2024-01-02 09:01:00");
    assert_eq!(decimal(&bars[0].2), Decimal::new(58600, 2));
    assert_eq!(bars[0].3.as_deref(), Some("1520"));
}

#[tokio::test]
async fn test_rerun_overwrites_instead_of_duplicating() {
    logging::init_test_logging();
    let db = TestDatabase::new();

    let first = MockGateway::start().await;
    first
        .with_stock(
            "2330",
            test_data::kbars_payload(&[
                (TS_0901_LOCAL, 586.0, 1520),
                (TS_0901_LOCAL + MINUTE_NANOS, 587.0, 900),
            ]),
        )
        .await;
    let summary = ingest(&first, &db, &["2330"]).await;
    assert_eq!(summary.total_rows, 2);

    // Same bars re-published with a corrected close
    let second = MockGateway::start().await;
    second
        .with_stock(
            "2330",
            test_data::kbars_payload(&[
                (TS_0901_LOCAL, 586.5, 1600),
                (TS_0901_LOCAL + MINUTE_NANOS, 587.0, 900),
            ]),
        )
        .await;
    let summary = ingest(&second, &db, &["2330"]).await;
    assert_eq!(summary.total_rows, 2);

    assert_eq!(db.count_rows().await, 2);
    let bars = db.bars().await;
    assert_eq!(decimal(&bars[0].2), Decimal::new(5865, 1));
    assert_eq!(bars[0].3.as_deref(), Some("1600"));
}

#[tokio::test]
async fn test_non_numeric_close_is_skipped() {
    logging::init_test_logging();
    let gateway = MockGateway::start().await;
    gateway
        .with_stock(
            "2317",
            json!({
                "ts": [TS_0901_LOCAL, TS_0901_LOCAL + MINUTE_NANOS],
                "Open": [104.0, 104.5],
                "High": [105.0, 105.0],
                "Low": [103.5, 104.0],
                "Close": ["--", 104.5],
                "Volume": [300, 200]
            }),
        )
        .await;

    let db = TestDatabase::new();
    let summary = ingest(&gateway, &db, &["2317"]).await;

    assert_eq!(summary.successful_symbols, 1);
    assert_eq!(summary.total_rows, 1);
    let bars = db.bars().await;
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].1, "2024-01-02 09:02:00");
}

#[tokio::test]
async fn test_null_timestamp_keeps_the_rest_of_the_symbol() {
    logging::init_test_logging();
    let gateway = MockGateway::start().await;
    gateway
        .with_stock(
            "2454",
            json!({
                "ts": [null, TS_0901_LOCAL + MINUTE_NANOS],
                "Open": [1000.0, 1001.0],
                "High": [1002.0, 1003.0],
                "Low": [999.0, 1000.0],
                "Close": [1001.0, 1002.0],
                "Volume": [50, 60]
            }),
        )
        .await;

    let db = TestDatabase::new();
    let summary = ingest(&gateway, &db, &["2454"]).await;

    assert_eq!(summary.successful_symbols, 1);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.total_rows, 1);
    let bars = db.bars().await;
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].1, "2024-01-02 09:02:00");
}

#[tokio::test]
async fn test_empty_result_is_no_data() {
    logging::init_test_logging();
    let gateway = MockGateway::start().await;
    gateway.with_stock("0050", test_data::kbars_payload(&[])).await;

    let db = TestDatabase::new();
    let summary = ingest(&gateway, &db, &["0050"]).await;

    assert_eq!(summary.successful_symbols, 0);
    assert_eq!(summary.empty_symbols, 1);
    assert!(summary.failed.is_empty());
    assert_eq!(db.count_rows().await, 0);
}

#[tokio::test]
async fn test_rejected_login_is_fatal() {
    logging::init_test_logging();
    let gateway = MockGateway::start().await;
    // Overrides the default login mock
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(403))
        .with_priority(1)
        .mount(&gateway.server)
        .await;

    let db = TestDatabase::new();
    let mut client = BrokerClient::new(&gateway.broker_config()).unwrap();
    let err = DataCollector::new(MockGateway::fast_settings())
        .run(
            &mut client,
            database::open_bar_store(&db.config()),
            &test_data::symbols(&["2330"]),
            &day_window(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::ProviderLogin(_)));
    assert!(!db.path.exists());
}
