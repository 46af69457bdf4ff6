pub mod macd;

pub use macd::{alpha, ema, InsufficientData, MacdIndicator, MacdPeriods, MacdSeries, MacdValues};
