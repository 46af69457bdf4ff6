use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single one-minute bar. Only the close feeds the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PriceBar {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }
}

/// Half-open time range `[start, end)` of history requested for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookbackWindow {
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LookbackWindow {
    /// The window of length `lookback` that ends at `now`. Fails when the
    /// start would fall outside the representable date range.
    pub fn ending_at(symbol: impl Into<String>, now: DateTime<Utc>, lookback: Duration) -> Result<Self> {
        let start = now.checked_sub_signed(lookback).ok_or_else(|| {
            Error::Config(format!(
                "lookback of {} minutes ends before the earliest supported date",
                lookback.num_minutes()
            ))
        })?;
        Ok(Self {
            symbol: symbol.into(),
            start,
            end: now,
        })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Discrete trend derived from MACD, signal and histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendState {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for TrendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendState::Bullish => write!(f, "BULLISH"),
            TrendState::Bearish => write!(f, "BEARISH"),
            TrendState::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
    Gtc,
}

/// An order to be sent to the brokerage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub qty: f64,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// `Some` only for limit orders.
    pub limit_price: Option<f64>,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Market order, good for the trading day.
    pub fn market(symbol: impl Into<String>, side: OrderSide, qty: f64) -> Self {
        Self {
            client_order_id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            qty,
            side,
            order_type: OrderType::Market,
            limit_price: None,
            time_in_force: TimeInForce::Day,
        }
    }

    /// Limit order, good until cancelled.
    pub fn limit(symbol: impl Into<String>, side: OrderSide, qty: f64, limit_price: f64) -> Self {
        Self {
            client_order_id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            qty,
            side,
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            time_in_force: TimeInForce::Gtc,
        }
    }
}

/// Brokerage acknowledgment of a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub qty: f64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub status: String,
    pub buying_power: f64,
    pub cash: f64,
    pub portfolio_value: f64,
}
