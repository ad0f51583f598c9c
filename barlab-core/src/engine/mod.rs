//! Backtesting engine — bar-by-bar simulation and supporting infrastructure.
//!
//! The engine consumes a validated [`Series`](crate::domain::Series) and a
//! strategy, then runs the bar loop:
//!
//! 1. Advance the clock and lookback window
//! 2. Mark open trades to the last price, record balance/equity/commission
//! 3. Hand control to the strategy (buy / sell / close at the current bar)
//! 4. At the end: final record, optional force-close, history assembly

pub mod accounting;
pub mod clock;
pub mod history;
pub mod loop_runner;
pub mod state;

pub use accounting::{round_cents, Account};
pub use clock::SimClock;
pub use history::{History, HistoryRow};
pub use loop_runner::{run_strategy, Backtest, Strategy};
pub use state::{ConfigError, EngineConfig, PositionMode, RunOutput};
