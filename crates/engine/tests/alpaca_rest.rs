//! Alpaca adapter against a mocked REST API.

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{BarSource, Brokerage, Error, LookbackWindow, OrderRequest, OrderSide};
use engine::AlpacaClient;

fn client(server: &MockServer) -> AlpacaClient {
    let base = Url::parse(&server.uri()).expect("mock server uri");
    AlpacaClient::with_client(
        "test-key",
        "test-secret",
        base.clone(),
        base,
        "iex",
        reqwest::Client::new(),
    )
}

fn window() -> LookbackWindow {
    let end = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();
    LookbackWindow::ending_at("AAPL", end, Duration::minutes(60)).expect("valid window")
}

#[tokio::test]
async fn fetches_bars_with_auth_headers_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/bars"))
        .and(header("APCA-API-KEY-ID", "test-key"))
        .and(header("APCA-API-SECRET-KEY", "test-secret"))
        .and(query_param("timeframe", "1Min"))
        .and(query_param("start", "2024-03-01T14:00:00Z"))
        .and(query_param("end", "2024-03-01T15:00:00Z"))
        .and(query_param("feed", "iex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bars": [
                {"t": "2024-03-01T14:01:00Z", "o": 180.0, "h": 181.0, "l": 179.5, "c": 180.5, "v": 1200},
                {"t": "2024-03-01T14:00:00Z", "o": 179.0, "h": 180.0, "l": 178.5, "c": 179.9, "v": 900}
            ],
            "symbol": "AAPL",
            "next_page_token": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let bars = client(&server).fetch(&window()).await.unwrap();

    assert_eq!(bars.len(), 2);
    assert!(bars[0].timestamp < bars[1].timestamp);
    assert_eq!(bars[0].close, 179.9);
    assert_eq!(bars[1].close, 180.5);
}

#[tokio::test]
async fn null_bars_is_an_empty_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/bars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bars": null,
            "symbol": "AAPL",
            "next_page_token": null
        })))
        .mount(&server)
        .await;

    let bars = client(&server).fetch(&window()).await.unwrap();
    assert!(bars.is_empty());
}

#[tokio::test]
async fn follows_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/bars"))
        .and(query_param("page_token", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bars": [{"t": "2024-03-01T14:02:00Z", "c": 181.0}],
            "next_page_token": null
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/bars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bars": [{"t": "2024-03-01T14:01:00Z", "c": 180.0}],
            "next_page_token": "page-2"
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let bars = client(&server).fetch(&window()).await.unwrap();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    assert_eq!(closes, vec![180.0, 181.0]);
}

#[tokio::test]
async fn unauthorized_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/bars"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": 40110000,
            "message": "request is not authorized"
        })))
        .mount(&server)
        .await;

    let err = client(&server).fetch(&window()).await.unwrap_err();
    assert!(matches!(err, Error::Auth(msg) if msg.contains("not authorized")));
}

#[tokio::test]
async fn server_error_is_a_market_data_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/bars"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client(&server).fetch(&window()).await.unwrap_err();
    assert!(matches!(err, Error::MarketData(msg) if msg.contains("503")));
}

#[tokio::test]
async fn garbage_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/bars"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server).fetch(&window()).await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn submits_limit_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .and(body_partial_json(json!({
            "symbol": "TSLA",
            "qty": "2",
            "side": "buy",
            "type": "limit",
            "time_in_force": "gtc",
            "limit_price": "250"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "61e69015-8549-4bfd-b9c3-01e75843f47d",
            "client_order_id": "abc",
            "symbol": "TSLA",
            "side": "buy",
            "qty": "2",
            "type": "limit",
            "status": "accepted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let order = OrderRequest::limit("TSLA", OrderSide::Buy, 2.0, 250.0);
    let ack = client(&server).submit_order(&order).await.unwrap();

    assert_eq!(ack.status, "accepted");
    assert_eq!(ack.side, OrderSide::Buy);
    assert_eq!(ack.qty, 2.0);
}

#[tokio::test]
async fn rejected_order_is_a_brokerage_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 40010001,
            "message": "qty must be > 0"
        })))
        .mount(&server)
        .await;

    let order = OrderRequest::market("AAPL", OrderSide::Sell, 1.0);
    let err = client(&server).submit_order(&order).await.unwrap_err();
    assert!(matches!(err, Error::Brokerage(msg) if msg.contains("qty must be > 0")));
}

#[tokio::test]
async fn reads_account_summary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "acct",
            "status": "ACTIVE",
            "buying_power": "40000.50",
            "cash": "10000",
            "portfolio_value": "12500.25",
            "equity": "12500.25"
        })))
        .mount(&server)
        .await;

    let account = client(&server).account().await.unwrap();
    assert_eq!(account.status, "ACTIVE");
    assert_eq!(account.buying_power, 40000.50);
    assert_eq!(account.cash, 10000.0);
    assert_eq!(account.portfolio_value, 12500.25);
}
