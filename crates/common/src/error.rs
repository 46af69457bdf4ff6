use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Brokerage error: {0}")]
    Brokerage(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
