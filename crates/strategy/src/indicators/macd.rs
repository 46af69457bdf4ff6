use serde::Serialize;
use thiserror::Error;

use common::{Error, Result};

/// MACD periods. `fast < slow`, all non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MacdPeriods {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl MacdPeriods {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Result<Self> {
        if fast == 0 || slow == 0 || signal == 0 {
            return Err(Error::Config(format!(
                "MACD periods must be positive, got {fast}/{slow}/{signal}"
            )));
        }
        if fast >= slow {
            return Err(Error::Config(format!(
                "MACD fast period ({fast}) must be less than slow period ({slow})"
            )));
        }
        Ok(Self { fast, slow, signal })
    }
}

impl Default for MacdPeriods {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// MACD, signal and histogram at the most recent bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdValues {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Per-bar series behind a `MacdValues`, all the same length as the input.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub fast_ema: Vec<f64>,
    pub slow_ema: Vec<f64>,
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdSeries {
    /// Values at the last bar, `None` for an empty series.
    pub fn latest(&self) -> Option<MacdValues> {
        Some(MacdValues {
            macd: *self.macd.last()?,
            signal: *self.signal.last()?,
            histogram: *self.histogram.last()?,
        })
    }
}

/// Not enough closes for a meaningful MACD. A status, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient data for MACD: have {available} closes, need {required}")]
pub struct InsufficientData {
    pub available: usize,
    pub required: usize,
}

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// MACD line = EMA(fast) − EMA(slow), signal = EMA(macd line, signal period),
/// histogram = MACD − signal. Every EMA is seeded with its first input value.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    periods: MacdPeriods,
}

impl MacdIndicator {
    pub fn new(periods: MacdPeriods) -> Self {
        Self { periods }
    }

    pub fn periods(&self) -> MacdPeriods {
        self.periods
    }

    /// Minimum number of closes `compute` accepts: the slow period.
    pub fn required_samples(&self) -> usize {
        self.periods.slow
    }

    /// Full per-bar series for `closes` (oldest first), with no length check.
    pub fn series(&self, closes: &[f64]) -> MacdSeries {
        let fast_ema = ema(closes, self.periods.fast);
        let slow_ema = ema(closes, self.periods.slow);
        let macd: Vec<f64> = fast_ema
            .iter()
            .zip(&slow_ema)
            .map(|(fast, slow)| fast - slow)
            .collect();
        let signal = ema(&macd, self.periods.signal);
        let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

        MacdSeries {
            fast_ema,
            slow_ema,
            macd,
            signal,
            histogram,
        }
    }

    /// MACD values at the last close.
    /// Returns `InsufficientData` when there are fewer than `slow` closes.
    pub fn compute(&self, closes: &[f64]) -> Result<MacdValues, InsufficientData> {
        let insufficient = InsufficientData {
            available: closes.len(),
            required: self.required_samples(),
        };
        if closes.len() < insufficient.required {
            return Err(insufficient);
        }
        self.series(closes).latest().ok_or(insufficient)
    }
}

/// Smoothing factor for an EMA of `period`.
pub fn alpha(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

/// Recursive exponential moving average over the whole series.
///
/// `out[0] = series[0]`, `out[i] = α·series[i] + (1 − α)·out[i − 1]`.
pub fn ema(series: &[f64], period: usize) -> Vec<f64> {
    let k = alpha(period);
    let mut out = Vec::with_capacity(series.len());
    let mut iter = series.iter();
    if let Some(&first) = iter.next() {
        out.push(first);
        let mut prev = first;
        for &value in iter {
            prev = k * value + (1.0 - k) * prev;
            out.push(prev);
        }
    }
    out
}
