//! Bar-by-bar orchestrator — the heart of the backtesting engine.
//!
//! A [`Backtest`] is an explicit cursor over bars `1..len` (bar 0 is the
//! warm-up/reference bar). Each `advance()`:
//! 1. Closes the books on the bar being left (records post-activity values)
//! 2. Moves the clock and lookback window to the next bar
//! 3. Marks open trades to the new last price and records the bar
//!
//! Between advances the caller (a strategy) inspects the window and issues
//! buy/sell/close, which execute immediately at the current bar's price.
//! [`Backtest::finish`] ends the run and applies the end-of-run close policy.

use crate::domain::{Bar, Direction, Series, TradeId};
use crate::engine::accounting::Account;
use crate::engine::clock::SimClock;
use crate::engine::history::History;
use crate::engine::state::{ConfigError, EngineConfig, RunOutput};
use tracing::{info, warn};

/// Per-bar decision logic driven by [`run_strategy`].
///
/// Strategies see the run only through the [`Backtest`] handle: the lookback
/// window, the account, and the trade commands.
pub trait Strategy {
    fn name(&self) -> &str;

    /// Called once per bar after the clock has advanced.
    fn on_bar(&mut self, bt: &mut Backtest<'_>);
}

/// One run over a borrowed series.
pub struct Backtest<'a> {
    series: &'a Series,
    clock: SimClock,
    account: Account,
    next_bar: usize,
}

impl<'a> Backtest<'a> {
    /// Validate the configuration and set up the clock and account.
    pub fn new(series: &'a Series, config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            series,
            clock: SimClock::new(series, config.lookback_window_size),
            account: Account::new(config, series.len()),
            next_bar: 1,
        })
    }

    pub fn has_next(&self) -> bool {
        self.next_bar < self.series.len()
    }

    /// Move to the next bar. Returns `false` once the series is exhausted.
    pub fn advance(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        if self.clock.current_bar() > 0 {
            self.account.refresh_values(&self.clock);
        }
        self.clock.advance(self.series, self.next_bar);
        self.account.refresh_values(&self.clock);
        self.next_bar += 1;
        true
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Lookback window ending at the current bar.
    pub fn window(&self) -> &'a [Bar] {
        self.clock.window(self.series)
    }

    pub fn current(&self) -> &'a Bar {
        &self.series.bars()[self.clock.current_bar()]
    }

    /// Bar before the current one, if the window holds one.
    pub fn previous(&self) -> Option<&'a Bar> {
        let window = self.window();
        window.len().checked_sub(2).map(|i| &window[i])
    }

    /// Open a default-sized long at the last price.
    pub fn buy(&mut self) -> Option<TradeId> {
        self.open_with(Direction::Long, None, None)
    }

    /// Open a default-sized short at the last price.
    pub fn sell(&mut self) -> Option<TradeId> {
        self.open_with(Direction::Short, None, None)
    }

    pub fn open_with(
        &mut self,
        direction: Direction,
        value: Option<f64>,
        price: Option<f64>,
    ) -> Option<TradeId> {
        self.account.open(&self.clock, direction, value, price)
    }

    /// Close every open trade at the last price.
    pub fn close(&mut self) -> usize {
        self.account.close_all(&self.clock, None)
    }

    pub fn close_trade(&mut self, id: TradeId, price: Option<f64>) -> bool {
        self.account.close_trade(&self.clock, id, price)
    }

    pub fn close_direction(&mut self, direction: Direction) -> usize {
        self.account.close_direction(&self.clock, direction, None)
    }

    /// End the run.
    ///
    /// Records the current bar once more, then, when `force_close_on_end` is
    /// set, closes whatever is still open at the last price and records again.
    /// Calling this before the series is exhausted stops the run early; bars
    /// never reached keep their initial history values.
    pub fn finish(mut self) -> RunOutput {
        self.account.refresh_values(&self.clock);

        if self.account.config().force_close_on_end && !self.account.opened_trades().is_empty() {
            let closed = self.account.close_all(&self.clock, None);
            warn!(
                closed,
                bar = self.clock.current_bar(),
                "force-closed open trades at end of run"
            );
            self.account.refresh_values(&self.clock);
        }

        let config = self.account.config().clone();
        let records: Vec<_> = self
            .account
            .closed_trades()
            .iter()
            .filter_map(|t| t.to_record())
            .collect();
        let history = History::build(
            self.series,
            self.account.history_balance(),
            self.account.history_equity(),
            self.account.history_commission(),
            &records,
            config.initial_balance,
        );
        let final_balance = self.account.balance();
        let final_equity = self.account.equity();
        let last_bar = self.clock.current_bar();
        let (trades, open_trades) = self.account.into_trades();

        info!(
            bars = last_bar + 1,
            trades = trades.len(),
            final_balance,
            final_equity,
            "run finished"
        );

        RunOutput {
            config,
            trades,
            open_trades,
            history,
            final_balance,
            final_equity,
            last_bar,
        }
    }
}

/// Drive `strategy` over every bar of `series` and finish the run.
pub fn run_strategy(
    series: &Series,
    config: &EngineConfig,
    strategy: &mut dyn Strategy,
) -> Result<RunOutput, ConfigError> {
    let mut bt = Backtest::new(series, config)?;
    info!(
        strategy = strategy.name(),
        bars = series.len(),
        initial_balance = config.initial_balance,
        "run started"
    );
    while bt.advance() {
        strategy.on_bar(&mut bt);
    }
    Ok(bt.finish())
}
