//! barlab runner — configuration, data loading, statistics, export, sweeps.
//!
//! This crate builds on `barlab-core` to provide:
//! - TOML run configuration
//! - CSV and synthetic series loading
//! - Built-in strategies selectable by name
//! - The statistics engine (returns, risk ratios, drawdowns, trade stats)
//! - JSON/CSV/Markdown artifact export
//! - Parallel parameter sweeps

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod strategy;
pub mod sweep;

pub use config::{
    BacktestConfig, ConfigError, DataConfig, DataSource, StatsConfig, StrategyConfig,
    MAX_SYNTHETIC_BARS,
};
pub use data_loader::{load_csv, load_series, read_csv, synthetic_series, LoadError};
pub use export::{
    export_history_csv, export_json, export_trades_csv, generate_report, import_json,
    import_trades_csv, load_artifacts, save_artifacts,
};
pub use metrics::{compute_stats, StatValue, Stats, StatsError, DEFAULT_RISK_FREE_RATE};
pub use runner::{run_backtest, run_from_config, BacktestResult, RunError, SCHEMA_VERSION};
pub use strategy::{BuyAndHold, SignalChange, StrategyKind};
pub use sweep::{sweep, SweepGrid, SweepRow};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn stats_is_send_sync() {
        assert_send::<Stats>();
        assert_sync::<Stats>();
    }

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<DataSource>();
        assert_sync::<DataSource>();
    }

    #[test]
    fn sweep_types_are_send_sync() {
        assert_send::<SweepGrid>();
        assert_sync::<SweepGrid>();
        assert_send::<SweepRow>();
        assert_sync::<SweepRow>();
    }

    #[test]
    fn strategies_are_send() {
        assert_send::<SignalChange>();
        assert_send::<BuyAndHold>();
        assert_send::<StrategyKind>();
    }
}
