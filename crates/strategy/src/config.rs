use serde::{Deserialize, Serialize};
use tracing::info;

use common::{Error, Result};

use crate::MacdPeriods;

/// Optional indicator settings file (TOML).
///
/// Example `config/indicators.toml`:
/// ```toml
/// [macd]
/// fast = 12
/// slow = 26
/// signal = 9
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IndicatorFileConfig {
    #[serde(default)]
    pub macd: MacdSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MacdSection {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdSection {
    fn default() -> Self {
        let periods = MacdPeriods::default();
        Self {
            fast: periods.fast,
            slow: periods.slow,
            signal: periods.signal,
        }
    }
}

impl IndicatorFileConfig {
    /// Load from a TOML file. Read or parse failures are configuration errors.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read indicator config at '{path}': {e}"))
        })?;
        let cfg = Self::parse(&content)
            .map_err(|e| Error::Config(format!("Failed to parse indicator config at '{path}': {e}")))?;
        info!(path, fast = cfg.macd.fast, slow = cfg.macd.slow, signal = cfg.macd.signal, "Loaded indicator config");
        Ok(cfg)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Defaults when `path` is `None`, otherwise the file's contents.
    pub fn load_optional(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validated MACD periods.
    pub fn periods(&self) -> Result<MacdPeriods> {
        MacdPeriods::new(self.macd.fast, self.macd.slow, self.macd.signal)
    }
}
