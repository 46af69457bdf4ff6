use async_trait::async_trait;

use crate::{AccountSummary, LookbackWindow, OrderAck, OrderRequest, PriceBar, Result};

/// Source of historical one-minute bars.
///
/// Implementations must return bars strictly ascending by timestamp with no
/// duplicate timestamps, all inside `[window.start, window.end)`. An empty
/// vector means the window has no data and is not an error.
#[async_trait]
pub trait BarSource: Send + Sync {
    async fn fetch(&self, window: &LookbackWindow) -> Result<Vec<PriceBar>>;
}

/// Order submission and account queries against the brokerage.
///
/// The stream loop never holds one of these; only `OrderExecutor` in
/// `crates/engine` does.
#[async_trait]
pub trait Brokerage: Send + Sync {
    /// Submit an order and return the brokerage's acknowledgment.
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck>;

    /// Query balances and status of the trading account.
    async fn account(&self) -> Result<AccountSummary>;
}
