//! Backtest runner — wires together data loading, the engine, and statistics.
//!
//! Two entry points:
//! - `run_backtest()`: takes a loaded series and a strategy. Used by sweeps
//!   and tests.
//! - `run_from_config()`: loads the series named by a `BacktestConfig`,
//!   builds the configured strategy, then runs. Used by the CLI.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use barlab_core::domain::{Series, Trade, TradeRecord};
use barlab_core::engine::{
    run_strategy, ConfigError as EngineConfigError, EngineConfig, History, Strategy,
};
use barlab_core::fingerprint::RunFingerprint;

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_series, LoadError};
use crate::metrics::{compute_stats, Stats, StatsError};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine config error: {0}")]
    Engine(#[from] EngineConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("stats error: {0}")]
    Stats(#[from] StatsError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub fingerprint: RunFingerprint,
    pub config: EngineConfig,
    /// Closed trades, in close order.
    pub trades: Vec<TradeRecord>,
    /// Trades still open at the end (only when force-close is off).
    #[serde(default)]
    pub open_trades: Vec<Trade>,
    pub history: History,
    pub stats: Stats,
    pub final_balance: f64,
    pub final_equity: f64,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run `strategy` over `series` and compute the statistics.
pub fn run_backtest(
    series: &Series,
    config: &EngineConfig,
    strategy: &mut dyn Strategy,
    risk_free_rate: f64,
) -> Result<BacktestResult, RunError> {
    let fingerprint = RunFingerprint::new(series, config, strategy.name());
    let output = run_strategy(series, config, strategy)?;
    let trades = output.trade_records();
    let stats = compute_stats(&output.history, &trades, risk_free_rate)?;

    info!(
        run_id = %fingerprint.run_id.short(),
        trades = trades.len(),
        equity_return_pct = stats.equity_return_pct,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        fingerprint,
        config: output.config,
        trades,
        open_trades: output.open_trades,
        history: output.history,
        stats,
        final_balance: output.final_balance,
        final_equity: output.final_equity,
    })
}

/// Load the configured series, build the configured strategy, and run.
pub fn run_from_config(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let series = load_series(&config.data.source()?)?;
    let mut strategy = config.strategy.kind.build();
    run_backtest(
        &series,
        &config.engine,
        strategy.as_mut(),
        config.stats.risk_free_rate,
    )
}
