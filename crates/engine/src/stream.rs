use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use common::{BarSource, LookbackWindow, PriceBar, StreamConfig, TrendState};
use dac::{OutputSink, WriteStatus, MACD_CHANNEL, SIGNAL_CHANNEL};
use strategy::{classify_values, MacdIndicator, MacdValues};

use crate::shutdown::Shutdown;

/// One stage of a polling cycle. Each variant carries what the next stage
/// needs; `Sleeping` carries how the cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Fetching,
    Computing {
        bars: Vec<PriceBar>,
    },
    Classifying {
        last: PriceBar,
        values: MacdValues,
    },
    Emitting {
        last: PriceBar,
        values: MacdValues,
        trend: TrendState,
    },
    Reporting(StatusReport),
    Sleeping(CycleOutcome),
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Reported(StatusReport),
    FetchFailed(String),
    NoData,
    InsufficientData {
        available: usize,
        required: usize,
        last_close: f64,
    },
}

/// The status line emitted once per successful cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub close: f64,
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub trend: TrendState,
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} | Price: ${:.2} | MACD: {:.4} | Signal: {:.4} | Histogram: {:.4} | {}",
            self.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            self.symbol,
            self.close,
            self.macd,
            self.signal,
            self.histogram,
            self.trend
        )
    }
}

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub cycles: u64,
    pub reported: u64,
    pub fetch_failures: u64,
    pub no_data: u64,
    pub insufficient: u64,
}

impl StreamSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Reported(_) => self.reported += 1,
            CycleOutcome::FetchFailed(_) => self.fetch_failures += 1,
            CycleOutcome::NoData => self.no_data += 1,
            CycleOutcome::InsufficientData { .. } => self.insufficient += 1,
        }
    }
}

/// Polls the bar source on a fixed interval and drives the MACD pipeline:
/// fetch → compute → classify → emit → report → sleep.
///
/// Strictly sequential. No indicator state survives a cycle; every cycle
/// recomputes from a freshly fetched window.
pub struct StreamLoop {
    config: StreamConfig,
    source: Arc<dyn BarSource>,
    indicator: MacdIndicator,
    sink: OutputSink,
    consecutive_failures: u32,
}

impl StreamLoop {
    pub fn new(
        config: StreamConfig,
        source: Arc<dyn BarSource>,
        indicator: MacdIndicator,
        sink: OutputSink,
    ) -> Self {
        Self {
            config,
            source,
            indicator,
            sink,
            consecutive_failures: 0,
        }
    }

    /// Run until `shutdown` is triggered. Cancellation is checked before each
    /// cycle and during the sleep, never in the middle of a cycle.
    pub async fn run(mut self, mut shutdown: Shutdown) -> StreamSummary {
        info!(
            symbol = %self.config.symbol,
            interval_secs = self.config.interval.as_secs(),
            lookback_mins = self.config.lookback.num_minutes(),
            dac = self.sink.is_enabled(),
            "Starting stream"
        );

        let mut summary = StreamSummary::default();
        loop {
            if shutdown.is_triggered() {
                break;
            }

            let outcome = self.run_cycle().await;
            summary.record(&outcome);

            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!(
            symbol = %self.config.symbol,
            cycles = summary.cycles,
            reported = summary.reported,
            fetch_failures = summary.fetch_failures,
            "Streaming stopped"
        );
        summary
    }

    /// Run one cycle from `Fetching` until it reaches `Sleeping`.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let mut stage = Stage::Fetching;
        loop {
            stage = match self.advance(stage).await {
                Stage::Sleeping(outcome) => return outcome,
                next => next,
            };
        }
    }

    /// Perform one stage and return the next.
    pub async fn advance(&mut self, stage: Stage) -> Stage {
        match stage {
            Stage::Fetching => self.fetch().await,

            Stage::Computing { bars } => self.compute(&bars),

            Stage::Classifying { last, values } => Stage::Emitting {
                last,
                values,
                trend: classify_values(&values),
            },

            Stage::Emitting {
                last,
                values,
                trend,
            } => {
                self.emit(&values);
                Stage::Reporting(StatusReport {
                    timestamp: Utc::now(),
                    symbol: self.config.symbol.clone(),
                    close: last.close,
                    macd: values.macd,
                    signal: values.signal,
                    histogram: values.histogram,
                    trend,
                })
            }

            Stage::Reporting(report) => {
                info!(
                    symbol = %report.symbol,
                    close = report.close,
                    macd = report.macd,
                    signal = report.signal,
                    histogram = report.histogram,
                    trend = %report.trend,
                    "{report}"
                );
                Stage::Sleeping(CycleOutcome::Reported(report))
            }

            sleeping @ Stage::Sleeping(_) => sleeping,
        }
    }

    async fn fetch(&mut self) -> Stage {
        let fetched = match LookbackWindow::ending_at(&self.config.symbol, Utc::now(), self.config.lookback) {
            Ok(window) => self.source.fetch(&window).await,
            Err(e) => Err(e),
        };

        match fetched {
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    symbol = %self.config.symbol,
                    error = %e,
                    consecutive_failures = self.consecutive_failures,
                    "Error getting data, retrying next cycle"
                );
                Stage::Sleeping(CycleOutcome::FetchFailed(e.to_string()))
            }
            Ok(bars) => {
                self.consecutive_failures = 0;
                if bars.is_empty() {
                    info!(symbol = %self.config.symbol, "No data for window");
                    Stage::Sleeping(CycleOutcome::NoData)
                } else {
                    debug!(symbol = %self.config.symbol, bars = bars.len(), "Fetched window");
                    Stage::Computing { bars }
                }
            }
        }
    }

    fn compute(&self, bars: &[PriceBar]) -> Stage {
        let Some(&last) = bars.last() else {
            return Stage::Sleeping(CycleOutcome::NoData);
        };
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        match self.indicator.compute(&closes) {
            Ok(values) => Stage::Classifying { last, values },
            Err(short) => {
                info!(
                    symbol = %self.config.symbol,
                    close = last.close,
                    available = short.available,
                    required = short.required,
                    "Insufficient data for MACD"
                );
                Stage::Sleeping(CycleOutcome::InsufficientData {
                    available: short.available,
                    required: short.required,
                    last_close: last.close,
                })
            }
        }
    }

    /// Signal line to channel A, MACD line to channel B. Failures are logged
    /// and never abort the cycle.
    fn emit(&mut self, values: &MacdValues) {
        for (address, value) in [(SIGNAL_CHANNEL, values.signal), (MACD_CHANNEL, values.macd)] {
            match self.sink.write(address, value) {
                Ok(WriteStatus::Written { code }) => {
                    debug!(address, value, code, "DAC updated");
                }
                Ok(WriteStatus::Skipped { value }) => {
                    debug!(address, value, "DAC write skipped");
                }
                Err(e) => {
                    warn!(address, error = %e, "DAC write failed");
                }
            }
        }
    }
}
