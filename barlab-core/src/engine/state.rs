//! Engine configuration and run output types.

use crate::domain::{Trade, TradeRecord};
use crate::engine::history::History;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the account treats a new entry while trades are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionMode {
    /// At most one open trade; opening closes whatever is open first.
    #[default]
    Netting,
    /// Trades of either side may coexist; each is closed explicitly.
    Hedging,
}

/// Configuration errors, rejected before any bar is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial_balance must be positive, got {0}")]
    InitialBalance(f64),
    #[error("commission must be in [0, 1), got {0}")]
    Commission(f64),
    #[error("default_entry_value must be positive, got {0}")]
    EntryValue(f64),
    #[error("default_entry_value_max must be positive, got {0}")]
    EntryValueMax(f64),
    #[error("lookback_window_size must be at least 1")]
    LookbackWindow,
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting cash.
    pub initial_balance: f64,
    /// Fraction charged on entry notional and again on exit notional.
    pub commission: f64,
    /// `<= 1`: fraction of balance per entry. `> 1`: fixed cash per entry.
    pub default_entry_value: f64,
    /// Hard cap on any single default-sized entry.
    pub default_entry_value_max: f64,
    /// Bars of history visible to the strategy each step (plus the current bar).
    pub lookback_window_size: usize,
    /// Close whatever is still open at the last price once the series ends.
    pub force_close_on_end: bool,
    pub position_mode: PositionMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            commission: 0.001,
            default_entry_value: 1.0,
            default_entry_value_max: 20_000.0,
            lookback_window_size: 10,
            force_close_on_end: true,
            position_mode: PositionMode::Netting,
        }
    }
}

impl EngineConfig {
    pub fn new(initial_balance: f64, commission: f64) -> Self {
        Self {
            initial_balance,
            commission,
            ..Self::default()
        }
    }

    /// Frictionless config: no commission, whole balance per entry, no cap.
    pub fn frictionless(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            commission: 0.0,
            default_entry_value: 1.0,
            default_entry_value_max: f64::MAX,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(ConfigError::InitialBalance(self.initial_balance));
        }
        if !(self.commission.is_finite() && (0.0..1.0).contains(&self.commission)) {
            return Err(ConfigError::Commission(self.commission));
        }
        if !(self.default_entry_value.is_finite() && self.default_entry_value > 0.0) {
            return Err(ConfigError::EntryValue(self.default_entry_value));
        }
        if self.default_entry_value_max.is_nan() || self.default_entry_value_max <= 0.0 {
            return Err(ConfigError::EntryValueMax(self.default_entry_value_max));
        }
        if self.lookback_window_size == 0 {
            return Err(ConfigError::LookbackWindow);
        }
        Ok(())
    }
}

/// Everything a finished run hands to reporting.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub config: EngineConfig,
    /// Closed trades in close order.
    pub trades: Vec<Trade>,
    /// Trades still open at the end (only when `force_close_on_end` is off).
    pub open_trades: Vec<Trade>,
    pub history: History,
    pub final_balance: f64,
    pub final_equity: f64,
    /// Last bar index the clock reached.
    pub last_bar: usize,
}

impl RunOutput {
    /// The Trades table.
    pub fn trade_records(&self) -> Vec<TradeRecord> {
        self.trades.iter().filter_map(Trade::to_record).collect()
    }
}
