use std::time::Duration;

use chrono::Utc;
use url::Url;

use crate::{Error, Result};

const DEFAULT_DATA_URL: &str = "https://data.alpaca.markets";
const DEFAULT_TRADING_URL: &str = "https://paper-api.alpaca.markets";
const DEFAULT_DAC_BUS: &str = "/dev/i2c-1";

/// Process configuration loaded from environment variables at startup.
/// Missing credentials are a fatal configuration error.
#[derive(Debug, Clone)]
pub struct Config {
    // Alpaca credentials
    pub api_key: String,
    pub secret_key: String,

    // Endpoints
    pub data_url: Url,
    pub trading_url: Url,
    /// Market data feed, `iex` for free accounts or `sip`.
    pub data_feed: String,
    pub http_timeout: Duration,

    // Hardware
    pub dac_bus_path: String,

    /// Optional TOML file overriding the MACD periods.
    pub indicator_config_path: Option<String>,
}

impl Config {
    /// Load configuration from the environment, reading `.env` if present.
    /// Explicit credentials (e.g. from the command line) take precedence.
    pub fn from_env(api_key: Option<String>, secret_key: Option<String>) -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(api_key, secret_key, |key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(
        api_key: Option<String>,
        secret_key: Option<String>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| var("ALPACA_API_KEY"))
            .ok_or_else(|| missing_credential("ALPACA_API_KEY"))?;
        let secret_key = secret_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| var("ALPACA_SECRET_KEY"))
            .ok_or_else(|| missing_credential("ALPACA_SECRET_KEY"))?;

        let data_url = parse_url(
            "ALPACA_DATA_URL",
            &var("ALPACA_DATA_URL").unwrap_or_else(|| DEFAULT_DATA_URL.to_string()),
        )?;
        let trading_url = parse_url(
            "ALPACA_TRADING_URL",
            &var("ALPACA_TRADING_URL").unwrap_or_else(|| DEFAULT_TRADING_URL.to_string()),
        )?;

        let http_timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(Error::Config(format!(
                        "HTTP_TIMEOUT_SECS must be a positive integer, got: '{raw}'"
                    )))
                }
            },
            None => Duration::from_secs(30),
        };

        Ok(Config {
            api_key,
            secret_key,
            data_url,
            trading_url,
            data_feed: var("ALPACA_DATA_FEED")
                .map(|f| f.to_lowercase())
                .unwrap_or_else(|| "iex".to_string()),
            http_timeout,
            dac_bus_path: var("DAC_BUS_PATH").unwrap_or_else(|| DEFAULT_DAC_BUS.to_string()),
            indicator_config_path: var("INDICATOR_CONFIG_PATH"),
        })
    }
}

fn missing_credential(key: &str) -> Error {
    Error::Config(format!(
        "Alpaca API credentials not found: set {key} in the environment or .env file"
    ))
}

fn parse_url(key: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::Config(format!("{key} is not a valid URL ('{raw}'): {e}")))
}

/// Parameters of one stream loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub symbol: String,
    pub interval: Duration,
    pub lookback: chrono::Duration,
}

impl StreamConfig {
    pub const DEFAULT_INTERVAL_SECS: u64 = 60;
    pub const DEFAULT_LOOKBACK_MINUTES: u64 = 60;

    pub fn new(symbol: &str, interval_seconds: u64, lookback_minutes: u64) -> Result<Self> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(Error::Config("symbol must not be empty".into()));
        }
        if interval_seconds == 0 {
            return Err(Error::Config("interval must be at least 1 second".into()));
        }
        if lookback_minutes == 0 {
            return Err(Error::Config("lookback must be at least 1 minute".into()));
        }
        // Must fit a TimeDelta and leave a representable window start.
        let lookback = i64::try_from(lookback_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .filter(|lookback| Utc::now().checked_sub_signed(*lookback).is_some())
            .ok_or_else(|| Error::Config(format!("lookback of {lookback_minutes} minutes is too large")))?;

        Ok(Self {
            symbol,
            interval: Duration::from_secs(interval_seconds),
            lookback,
        })
    }
}
