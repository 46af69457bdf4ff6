pub mod config;
pub mod error;
pub mod exchange;
pub mod types;

pub use config::{Config, StreamConfig};
pub use error::{Error, Result};
pub use exchange::{BarSource, Brokerage};
pub use types::*;
