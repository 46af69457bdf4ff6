pub mod config;
pub mod indicators;
pub mod trend;

pub use config::IndicatorFileConfig;
pub use indicators::{InsufficientData, MacdIndicator, MacdPeriods, MacdSeries, MacdValues};
pub use trend::{classify, classify_values};
