use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use common::{
    AccountSummary, BarSource, Brokerage, Config, Error, LookbackWindow, OrderAck, OrderRequest,
    OrderSide, OrderType, PriceBar, Result, TimeInForce,
};

/// Upper bound on bar pages followed for one window.
const MAX_PAGES: usize = 50;

/// REST client for Alpaca. Serves historical bars to the stream loop and
/// order/account calls to the `OrderExecutor`.
pub struct AlpacaClient {
    api_key: String,
    secret_key: String,
    data_url: Url,
    trading_url: Url,
    feed: String,
    http: Client,
}

impl AlpacaClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(cfg.http_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(
            cfg.api_key.clone(),
            cfg.secret_key.clone(),
            cfg.data_url.clone(),
            cfg.trading_url.clone(),
            cfg.data_feed.clone(),
            http,
        ))
    }

    /// Build against explicit endpoints and HTTP client.
    pub fn with_client(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        data_url: Url,
        trading_url: Url,
        feed: impl Into<String>,
        http: Client,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            data_url,
            trading_url,
            feed: feed.into(),
            http,
        }
    }

    fn endpoint(base: &Url, path: &str) -> Result<Url> {
        base.join(path)
            .map_err(|e| Error::Config(format!("Invalid endpoint '{path}' on {base}: {e}")))
    }

    /// `/v2/stocks/{symbol}/bars`, with the symbol as one encoded path segment.
    fn bars_url(&self, symbol: &str) -> Result<Url> {
        let mut url = Self::endpoint(&self.data_url, "/v2/stocks/")?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("{} cannot be a base URL", self.data_url)))?
            .pop_if_empty()
            .push(symbol)
            .push("bars");
        Ok(url)
    }

    /// Send an authenticated request. Returns status and body; 401/403 are
    /// mapped to `Error::Auth`, every other status is left to the caller.
    async fn execute(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let resp = request
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Auth(format!("HTTP {status}: {}", api_message(&body))));
        }
        Ok((status, body))
    }

    async fn bars_page(
        &self,
        url: &Url,
        window: &LookbackWindow,
        page_token: Option<&str>,
    ) -> Result<BarsPage> {
        let mut query = vec![
            ("timeframe", "1Min".to_string()),
            ("start", rfc3339(window.start)),
            ("end", rfc3339(window.end)),
            ("limit", "10000".to_string()),
            ("feed", self.feed.clone()),
        ];
        if let Some(token) = page_token {
            query.push(("page_token", token.to_string()));
        }

        let (status, body) = self.execute(self.http.get(url.clone()).query(&query)).await?;
        if !status.is_success() {
            return Err(Error::MarketData(format!("HTTP {status}: {}", api_message(&body))));
        }
        serde_json::from_str(&body).map_err(|e| Error::Decode(format!("bars response: {e}")))
    }
}

#[async_trait]
impl BarSource for AlpacaClient {
    async fn fetch(&self, window: &LookbackWindow) -> Result<Vec<PriceBar>> {
        let url = self.bars_url(&window.symbol)?;

        let mut bars = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page = self.bars_page(&url, window, page_token.as_deref()).await?;
            bars.extend(
                page.bars
                    .unwrap_or_default()
                    .into_iter()
                    .map(|b| PriceBar::new(b.timestamp, b.close)),
            );
            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }
        if page_token.is_some() {
            warn!(symbol = %window.symbol, pages = MAX_PAGES, "Bar pagination truncated");
        }

        let bars = normalize(window, bars);
        debug!(symbol = %window.symbol, count = bars.len(), "Fetched bars");
        Ok(bars)
    }
}

#[async_trait]
impl Brokerage for AlpacaClient {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let url = Self::endpoint(&self.trading_url, "/v2/orders")?;
        let body = OrderBody {
            symbol: &order.symbol,
            qty: order.qty.to_string(),
            side: order.side,
            order_type: order.order_type,
            time_in_force: order.time_in_force,
            limit_price: order.limit_price.map(|p| p.to_string()),
            client_order_id: &order.client_order_id,
        };

        debug!(symbol = %order.symbol, side = %order.side, "Submitting order to Alpaca");
        let (status, text) = self.execute(self.http.post(url).json(&body)).await?;
        if !status.is_success() {
            return Err(Error::Brokerage(format!("HTTP {status}: {}", api_message(&text))));
        }

        let resp: OrderResponse =
            serde_json::from_str(&text).map_err(|e| Error::Decode(format!("order response: {e}")))?;

        Ok(OrderAck {
            id: resp.id,
            client_order_id: resp.client_order_id,
            symbol: resp.symbol,
            side: resp.side,
            qty: resp
                .qty
                .and_then(|q| q.parse::<f64>().ok())
                .unwrap_or(order.qty),
            status: resp.status,
        })
    }

    async fn account(&self) -> Result<AccountSummary> {
        let url = Self::endpoint(&self.trading_url, "/v2/account")?;
        let (status, text) = self.execute(self.http.get(url)).await?;
        if !status.is_success() {
            return Err(Error::Brokerage(format!("HTTP {status}: {}", api_message(&text))));
        }

        let account: AccountResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Decode(format!("account response: {e}")))?;
        let portfolio_value = account
            .portfolio_value
            .or(account.equity)
            .ok_or_else(|| Error::Decode("account response has no portfolio value".into()))?;

        Ok(AccountSummary {
            status: account.status,
            buying_power: parse_amount("buying_power", &account.buying_power)?,
            cash: parse_amount("cash", &account.cash)?,
            portfolio_value: parse_amount("portfolio_value", &portfolio_value)?,
        })
    }
}

/// Keep bars inside the window, ascending, one per timestamp.
fn normalize(window: &LookbackWindow, mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.retain(|b| window.contains(b.timestamp));
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    bars
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_amount(field: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|e| Error::Decode(format!("{field} '{raw}' is not a number: {e}")))
}

/// Alpaca error bodies look like `{"code": 40010001, "message": "..."}`.
fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_string())
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct BarsPage {
    #[serde(default)]
    bars: Option<Vec<WireBar>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct WireBar {
    #[serde(rename = "t")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "c")]
    close: f64,
}

#[derive(Serialize)]
struct OrderBody<'a> {
    symbol: &'a str,
    qty: String,
    side: OrderSide,
    #[serde(rename = "type")]
    order_type: OrderType,
    time_in_force: TimeInForce,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<String>,
    client_order_id: &'a str,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    client_order_id: String,
    symbol: String,
    side: OrderSide,
    #[serde(default)]
    qty: Option<String>,
    status: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    status: String,
    buying_power: String,
    cash: String,
    #[serde(default)]
    portfolio_value: Option<String>,
    #[serde(default)]
    equity: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}
