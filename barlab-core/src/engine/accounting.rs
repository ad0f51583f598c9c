//! Account — balance, open/closed trades, per-bar balance/equity/commission history.

use crate::domain::{Direction, Trade, TradeExit, TradeId, TradeIdGen};
use crate::engine::clock::SimClock;
use crate::engine::state::{EngineConfig, PositionMode};
use tracing::{debug, warn};

/// Round to cents, the precision balance and equity are booked at.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Cash account for one run.
///
/// Balance moves only when a trade closes. Equity is recomputed by
/// [`Account::refresh_values`] once per bar and written into the bar's
/// history slot together with balance and cumulative commission.
#[derive(Debug, Clone)]
pub struct Account {
    config: EngineConfig,
    balance: f64,
    equity: f64,
    commission_spent: f64,
    opened_trades: Vec<Trade>,
    closed_trades: Vec<Trade>,
    history_balance: Vec<f64>,
    history_equity: Vec<f64>,
    history_commission: Vec<f64>,
    ids: TradeIdGen,
}

impl Account {
    /// New account with history slots for `total_bars` bars, pre-filled with
    /// the initial balance (and zero commission).
    pub fn new(config: &EngineConfig, total_bars: usize) -> Self {
        let initial = config.initial_balance;
        Self {
            config: config.clone(),
            balance: initial,
            equity: initial,
            commission_spent: 0.0,
            opened_trades: Vec::new(),
            closed_trades: Vec::new(),
            history_balance: vec![initial; total_bars],
            history_equity: vec![initial; total_bars],
            history_commission: vec![0.0; total_bars],
            ids: TradeIdGen::default(),
        }
    }

    /// Requested notional for a default-sized entry.
    ///
    /// `default_entry_value <= 1` is a fraction of the current balance,
    /// anything larger is a fixed cash amount. Both are capped at
    /// `default_entry_value_max`.
    pub fn default_entry_value(&self) -> f64 {
        let cap = self.config.default_entry_value_max;
        if self.config.default_entry_value <= 1.0 {
            (self.balance * self.config.default_entry_value).min(cap)
        } else {
            self.config.default_entry_value.min(cap)
        }
    }

    /// Open a trade at the current bar.
    ///
    /// In netting mode every open trade is closed first. On the final bar of
    /// the run nothing is opened and `None` is returned. An explicit `value`
    /// that is not positive falls back to default sizing.
    pub fn open(
        &mut self,
        clock: &SimClock,
        direction: Direction,
        value: Option<f64>,
        price: Option<f64>,
    ) -> Option<TradeId> {
        if self.config.position_mode == PositionMode::Netting {
            self.close_all(clock, None);
        }

        if clock.is_last_bar() {
            debug!(bar = clock.current_bar(), "skipping open on final bar");
            return None;
        }

        let requested = value
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or_else(|| self.default_entry_value());
        if !(requested.is_finite() && requested > 0.0) {
            warn!(
                bar = clock.current_bar(),
                balance = self.balance,
                "no capital to open a trade"
            );
            return None;
        }

        let entry_price = price.unwrap_or_else(|| clock.last_price());
        let entry_commission = requested * self.config.commission;
        let trade = Trade {
            id: self.ids.next_id(),
            direction,
            entry_value: requested - entry_commission,
            entry_price,
            entry_bar: clock.current_bar(),
            entry_time: clock.current_time(),
            entry_commission,
            exit: None,
            exit_commission: 0.0,
        };
        debug!(
            id = %trade.id,
            ?direction,
            bar = trade.entry_bar,
            price = entry_price,
            value = trade.entry_value,
            "opened trade"
        );
        let id = trade.id;
        self.opened_trades.push(trade);
        Some(id)
    }

    /// Close one open trade at `price` (default: last price).
    ///
    /// Returns `false` when `id` is not an open trade; that is not an error.
    pub fn close_trade(&mut self, clock: &SimClock, id: TradeId, price: Option<f64>) -> bool {
        let Some(pos) = self.opened_trades.iter().position(|t| t.id == id) else {
            return false;
        };
        let mut trade = self.opened_trades.remove(pos);

        let exit_price = price.unwrap_or_else(|| clock.last_price());
        let pnl = trade.pnl_value(exit_price);
        trade.exit_commission = (trade.entry_value + pnl) * self.config.commission;
        trade.exit = Some(TradeExit {
            value: pnl + trade.entry_value,
            price: exit_price,
            bar: clock.current_bar(),
            time: clock.current_time(),
        });
        self.balance += round_cents(pnl - trade.exit_commission);

        debug!(
            id = %trade.id,
            bar = clock.current_bar(),
            price = exit_price,
            pnl,
            balance = self.balance,
            "closed trade"
        );
        self.closed_trades.push(trade);
        true
    }

    /// Close every open trade. Iterates over a snapshot of ids.
    pub fn close_all(&mut self, clock: &SimClock, price: Option<f64>) -> usize {
        let ids: Vec<TradeId> = self.opened_trades.iter().map(|t| t.id).collect();
        ids.into_iter()
            .filter(|&id| self.close_trade(clock, id, price))
            .count()
    }

    /// Close every open trade on one side.
    pub fn close_direction(
        &mut self,
        clock: &SimClock,
        direction: Direction,
        price: Option<f64>,
    ) -> usize {
        let ids: Vec<TradeId> = self
            .opened_trades
            .iter()
            .filter(|t| t.direction == direction)
            .map(|t| t.id)
            .collect();
        ids.into_iter()
            .filter(|&id| self.close_trade(clock, id, price))
            .count()
    }

    /// Recompute commission and equity and record them for the current bar.
    pub fn refresh_values(&mut self, clock: &SimClock) {
        let last_price = clock.last_price();
        self.commission_spent = self
            .opened_trades
            .iter()
            .chain(self.closed_trades.iter())
            .map(Trade::total_commissions)
            .sum();
        let open_value: f64 = self
            .opened_trades
            .iter()
            .map(|t| t.pnl_value(last_price) - t.total_commissions())
            .sum();
        self.equity = round_cents(self.balance + open_value);

        let bar = clock.current_bar();
        self.history_balance[bar] = self.balance;
        self.history_equity[bar] = self.equity;
        self.history_commission[bar] = round_cents(self.commission_spent);
    }

    /// Sum of unrealized profit over open trades at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.opened_trades.iter().map(|t| t.pnl_value(price)).sum()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn commission_spent(&self) -> f64 {
        self.commission_spent
    }

    pub fn opened_trades(&self) -> &[Trade] {
        &self.opened_trades
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed_trades
    }

    pub fn history_balance(&self) -> &[f64] {
        &self.history_balance
    }

    pub fn history_equity(&self) -> &[f64] {
        &self.history_equity
    }

    pub fn history_commission(&self) -> &[f64] {
        &self.history_commission
    }

    pub fn into_trades(self) -> (Vec<Trade>, Vec<Trade>) {
        (self.closed_trades, self.opened_trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Series;
    use chrono::{Duration, NaiveDate};

    fn series(closes: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Series::from_closes(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| (start + Duration::days(i as i64), c)),
        )
        .unwrap()
    }

    fn at(series: &Series, bar: usize) -> SimClock {
        let mut clock = SimClock::new(series, 10);
        clock.advance(series, bar);
        clock
    }

    #[test]
    fn fractional_entry_sizing() {
        let config = EngineConfig {
            default_entry_value: 0.5,
            default_entry_value_max: 1_000_000.0,
            ..EngineConfig::new(10_000.0, 0.0)
        };
        let account = Account::new(&config, 4);
        assert_eq!(account.default_entry_value(), 5_000.0);
    }

    #[test]
    fn fractional_entry_sizing_is_capped() {
        let config = EngineConfig {
            default_entry_value: 0.5,
            default_entry_value_max: 3_000.0,
            ..EngineConfig::new(10_000.0, 0.0)
        };
        let account = Account::new(&config, 4);
        assert_eq!(account.default_entry_value(), 3_000.0);
    }

    #[test]
    fn fixed_cash_entry_sizing() {
        let config = EngineConfig {
            default_entry_value: 2_500.0,
            default_entry_value_max: 2_000.0,
            ..EngineConfig::new(10_000.0, 0.0)
        };
        let account = Account::new(&config, 4);
        assert_eq!(account.default_entry_value(), 2_000.0);
    }

    #[test]
    fn entry_commission_reduces_entry_value() {
        let s = series(&[100.0, 100.0, 110.0]);
        let config = EngineConfig {
            default_entry_value_max: 1_000_000.0,
            ..EngineConfig::new(10_000.0, 0.01)
        };
        let mut account = Account::new(&config, s.len());
        let clock = at(&s, 1);
        account.open(&clock, Direction::Long, None, None).unwrap();

        let trade = &account.opened_trades()[0];
        assert!((trade.entry_commission - 100.0).abs() < 1e-9);
        assert!((trade.entry_value - 9_900.0).abs() < 1e-9);
        assert_eq!(trade.entry_price, 100.0);
        assert_eq!(trade.entry_bar, 1);
    }

    #[test]
    fn exit_commission_on_realized_notional() {
        let s = series(&[100.0, 100.0, 110.0]);
        let config = EngineConfig {
            default_entry_value_max: 1_000_000.0,
            ..EngineConfig::new(10_000.0, 0.01)
        };
        let mut account = Account::new(&config, s.len());
        let id = account
            .open(&at(&s, 1), Direction::Long, None, None)
            .unwrap();
        assert!(account.close_trade(&at(&s, 2), id, None));

        let trade = &account.closed_trades()[0];
        // entry_value 9900, +10% → pnl 990, realized notional 10890
        assert!((trade.exit_commission - 108.9).abs() < 1e-9);
        let exit = trade.exit.unwrap();
        assert!((exit.value - 10_890.0).abs() < 1e-9);
        // balance += round(990 - 108.9, 2)
        assert!((account.balance() - 10_881.10).abs() < 1e-9);
    }

    #[test]
    fn netting_closes_before_opening() {
        let s = series(&[100.0, 100.0, 105.0, 110.0]);
        let mut account = Account::new(&EngineConfig::frictionless(10_000.0), s.len());
        account.open(&at(&s, 1), Direction::Long, None, None);
        account.open(&at(&s, 2), Direction::Short, None, None);

        assert_eq!(account.opened_trades().len(), 1);
        assert_eq!(account.opened_trades()[0].direction, Direction::Short);
        assert_eq!(account.closed_trades().len(), 1);
        assert!((account.balance() - 10_500.0).abs() < 1e-9);
    }

    #[test]
    fn hedging_keeps_both_sides_open() {
        let s = series(&[100.0, 100.0, 105.0, 110.0]);
        let config = EngineConfig {
            position_mode: PositionMode::Hedging,
            default_entry_value: 0.5,
            ..EngineConfig::frictionless(10_000.0)
        };
        let mut account = Account::new(&config, s.len());
        account.open(&at(&s, 1), Direction::Long, None, None);
        account.open(&at(&s, 2), Direction::Short, None, None);
        assert_eq!(account.opened_trades().len(), 2);

        let closed = account.close_direction(&at(&s, 3), Direction::Long, None);
        assert_eq!(closed, 1);
        assert_eq!(account.opened_trades().len(), 1);
        assert_eq!(account.opened_trades()[0].direction, Direction::Short);
    }

    #[test]
    fn open_on_final_bar_is_noop() {
        let s = series(&[100.0, 101.0, 102.0]);
        let mut account = Account::new(&EngineConfig::frictionless(10_000.0), s.len());
        assert!(account
            .open(&at(&s, 2), Direction::Long, None, None)
            .is_none());
        assert!(account.opened_trades().is_empty());
    }

    #[test]
    fn closing_unknown_trade_is_noop() {
        let s = series(&[100.0, 101.0, 102.0]);
        let mut account = Account::new(&EngineConfig::frictionless(10_000.0), s.len());
        let id = account
            .open(&at(&s, 1), Direction::Long, None, None)
            .unwrap();
        assert!(account.close_trade(&at(&s, 1), id, None));
        assert!(!account.close_trade(&at(&s, 1), id, None));
        assert_eq!(account.closed_trades().len(), 1);
    }

    #[test]
    fn explicit_value_and_price_override_defaults() {
        let s = series(&[100.0, 101.0, 102.0]);
        let mut account = Account::new(&EngineConfig::frictionless(10_000.0), s.len());
        account.open(&at(&s, 1), Direction::Long, Some(1_234.0), Some(99.0));
        let trade = &account.opened_trades()[0];
        assert_eq!(trade.entry_value, 1_234.0);
        assert_eq!(trade.entry_price, 99.0);
    }

    #[test]
    fn refresh_records_equity_with_unrealized_pnl() {
        let s = series(&[100.0, 100.0, 110.0]);
        let mut account = Account::new(&EngineConfig::frictionless(10_000.0), s.len());
        account.open(&at(&s, 1), Direction::Long, None, None);
        let clock = at(&s, 2);
        account.refresh_values(&clock);

        assert_eq!(account.history_balance()[2], 10_000.0);
        assert!((account.history_equity()[2] - 11_000.0).abs() < 1e-9);
        assert_eq!(account.history_equity()[0], 10_000.0);
        assert!((account.unrealized_pnl(110.0) - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn round_cents_behaviour() {
        assert_eq!(round_cents(1.234), 1.23);
        assert_eq!(round_cents(-1.236), -1.24);
        assert_eq!(round_cents(500.0000000000004), 500.0);
    }
}
