//! Run configuration loaded from TOML.
//!
//! ```toml
//! [data]
//! path = "prices.csv"      # or: synthetic_bars = 500, seed = 7
//!
//! [engine]
//! initial_balance = 10000.0
//! commission = 0.001
//! position_mode = "netting"
//!
//! [strategy]
//! kind = "signal_change"
//!
//! [stats]
//! risk_free_rate = 5.0
//! ```

use crate::metrics::DEFAULT_RISK_FREE_RATE;
use crate::strategy::StrategyKind;
use barlab_core::engine::{ConfigError as EngineConfigError, EngineConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid engine settings: {0}")]
    Engine(#[from] EngineConfigError),

    #[error("[data] needs exactly one of `path` or `synthetic_bars`")]
    DataSource,

    #[error("synthetic_bars must be at most {max}, got {bars}")]
    SyntheticBars { bars: usize, max: usize },

    #[error("risk_free_rate must be finite, got {0}")]
    RiskFreeRate(f64),
}

/// Upper bound on a generated series.
pub const MAX_SYNTHETIC_BARS: usize = 10_000_000;

/// Full configuration for one backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub data: DataConfig,
    pub engine: EngineConfig,
    pub strategy: StrategyConfig,
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file with a timestamp column and a close column.
    pub path: Option<PathBuf>,
    /// Generate a random-walk series of this many bars instead.
    pub synthetic_bars: Option<usize>,
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            synthetic_bars: None,
            seed: 42,
        }
    }
}

/// Where the series for a run comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Csv(PathBuf),
    Synthetic { bars: usize, seed: u64 },
}

impl DataConfig {
    pub fn source(&self) -> Result<DataSource, ConfigError> {
        match (&self.path, self.synthetic_bars) {
            (Some(path), None) => Ok(DataSource::Csv(path.clone())),
            (None, Some(bars)) if bars > MAX_SYNTHETIC_BARS => Err(ConfigError::SyntheticBars {
                bars,
                max: MAX_SYNTHETIC_BARS,
            }),
            (None, Some(bars)) => Ok(DataSource::Synthetic {
                bars,
                seed: self.seed,
            }),
            _ => Err(ConfigError::DataSource),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub risk_free_rate: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }
}

impl BacktestConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file without validating it.
    ///
    /// For callers that layer overrides on top and call [`validate`](Self::validate)
    /// once they are done.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.data.source()?;
        if !self.stats.risk_free_rate.is_finite() {
            return Err(ConfigError::RiskFreeRate(self.stats.risk_free_rate));
        }
        Ok(())
    }
}
