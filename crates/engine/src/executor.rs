use std::sync::Arc;

use tracing::{error, info};

use common::{AccountSummary, Brokerage, Error, OrderAck, OrderRequest, OrderSide, Result};

/// Pass-through for operator orders and account queries.
///
/// This is the ONLY component that calls `Brokerage::submit_order`. The
/// stream loop never trades.
pub struct OrderExecutor {
    client: Arc<dyn Brokerage>,
}

impl OrderExecutor {
    pub fn new(client: Arc<dyn Brokerage>) -> Self {
        Self { client }
    }

    /// Submit a market order, or a limit order when `limit_price` is set.
    pub async fn place(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: f64,
        limit_price: Option<f64>,
    ) -> Result<OrderAck> {
        let order = build_order(symbol, side, qty, limit_price)?;
        info!(
            symbol = %order.symbol,
            side = %order.side,
            qty = order.qty,
            limit_price = ?order.limit_price,
            "Submitting order"
        );

        match self.client.submit_order(&order).await {
            Ok(ack) => {
                match order.limit_price {
                    Some(price) => info!(
                        id = %ack.id,
                        status = %ack.status,
                        "Limit {} order submitted for {} shares of {} at ${price}",
                        order.side, order.qty, order.symbol
                    ),
                    None => info!(
                        id = %ack.id,
                        status = %ack.status,
                        "Market {} order submitted for {} shares of {}",
                        order.side, order.qty, order.symbol
                    ),
                }
                Ok(ack)
            }
            Err(e) => {
                error!(symbol = %order.symbol, side = %order.side, error = %e, "Order submission failed");
                Err(e)
            }
        }
    }

    /// Fetch and log the account summary.
    pub async fn account(&self) -> Result<AccountSummary> {
        let account = self.client.account().await.map_err(|e| {
            error!(error = %e, "Account query failed");
            e
        })?;
        info!(
            status = %account.status,
            buying_power = account.buying_power,
            cash = account.cash,
            portfolio_value = account.portfolio_value,
            "Account Status: {} | Buying Power: ${:.2} | Cash: ${:.2} | Portfolio Value: ${:.2}",
            account.status,
            account.buying_power,
            account.cash,
            account.portfolio_value
        );
        Ok(account)
    }
}

fn build_order(symbol: &str, side: OrderSide, qty: f64, limit_price: Option<f64>) -> Result<OrderRequest> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(Error::InvalidOrder("symbol must not be empty".into()));
    }
    if !(qty.is_finite() && qty > 0.0) {
        return Err(Error::InvalidOrder(format!("quantity must be positive, got {qty}")));
    }
    match limit_price {
        Some(price) if !(price.is_finite() && price > 0.0) => Err(Error::InvalidOrder(format!(
            "limit price must be positive, got {price}"
        ))),
        Some(price) => Ok(OrderRequest::limit(symbol, side, qty, price)),
        None => Ok(OrderRequest::market(symbol, side, qty)),
    }
}
