use common::TrendState;

use crate::indicators::MacdValues;

/// Classify the trend from the latest MACD values.
///
/// Bullish needs MACD above signal *and* a positive histogram, bearish the
/// mirror image. Everything else, NaN included, is neutral.
pub fn classify(macd: f64, signal: f64, histogram: f64) -> TrendState {
    if macd > signal && histogram > 0.0 {
        TrendState::Bullish
    } else if macd < signal && histogram < 0.0 {
        TrendState::Bearish
    } else {
        TrendState::Neutral
    }
}

pub fn classify_values(values: &MacdValues) -> TrendState {
    classify(values.macd, values.signal, values.histogram)
}
