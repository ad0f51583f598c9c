//! Built-in strategies and the serializable strategy selector.

use barlab_core::engine::{Backtest, Strategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strategy selector used in run configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Follow the `signal` column: trade whenever it changes.
    #[default]
    SignalChange,
    BuyAndHold,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::SignalChange => "signal_change",
            StrategyKind::BuyAndHold => "buy_and_hold",
        }
    }

    pub fn build(self) -> Box<dyn Strategy + Send> {
        match self {
            StrategyKind::SignalChange => Box::new(SignalChange),
            StrategyKind::BuyAndHold => Box::new(BuyAndHold::default()),
        }
    }
}

/// Trades on changes of the per-bar `signal` value.
///
/// When the current bar's signal differs from the previous bar's:
/// `1` opens a long, `-1` opens a short, anything else closes all.
/// Missing signals count as flat.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalChange;

impl Strategy for SignalChange {
    fn name(&self) -> &str {
        StrategyKind::SignalChange.name()
    }

    fn on_bar(&mut self, bt: &mut Backtest<'_>) {
        let current = bt.current().signal_or_flat();
        let previous = match bt.previous() {
            Some(bar) => bar.signal_or_flat(),
            // Nothing before the current bar: compare against flat.
            None => 0,
        };
        if current == previous {
            return;
        }
        debug!(bar = bt.clock().current_bar(), previous, current, "signal changed");
        match current {
            1 => {
                bt.buy();
            }
            -1 => {
                bt.sell();
            }
            _ => {
                bt.close();
            }
        }
    }
}

/// Goes long on the first evaluated bar and holds to the end.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyAndHold {
    entered: bool,
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        StrategyKind::BuyAndHold.name()
    }

    fn on_bar(&mut self, bt: &mut Backtest<'_>) {
        if !self.entered {
            self.entered = bt.buy().is_some();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barlab_core::domain::{Bar, Series};
    use barlab_core::engine::{run_strategy, EngineConfig};
    use chrono::{Duration, NaiveDate};

    fn series(rows: &[(f64, Option<i8>)]) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(close, signal))| Bar {
                signal,
                ..Bar::from_close(start + Duration::days(i as i64), close)
            })
            .collect();
        Series::new(bars).unwrap()
    }

    #[test]
    fn signal_change_follows_signal_column() {
        let s = series(&[
            (100.0, Some(0)),
            (100.0, Some(1)),
            (110.0, Some(1)),
            (120.0, Some(-1)),
            (110.0, None),
            (100.0, Some(0)),
        ]);
        let out = run_strategy(&s, &EngineConfig::frictionless(10_000.0), &mut SignalChange)
            .unwrap();
        let trades = out.trade_records();
        assert_eq!(trades.len(), 2);
        assert!(trades[0].is_long);
        assert_eq!((trades[0].entry_bar, trades[0].exit_bar), (1, 3));
        assert!(!trades[1].is_long);
        // Missing signal at bar 4 reads as flat, so the short closes there.
        assert_eq!((trades[1].entry_bar, trades[1].exit_bar), (3, 4));
    }

    #[test]
    fn signal_change_ignores_repeated_signal() {
        let s = series(&[(100.0, Some(1)), (101.0, Some(1)), (102.0, Some(1))]);
        let out = run_strategy(&s, &EngineConfig::frictionless(10_000.0), &mut SignalChange)
            .unwrap();
        assert!(out.trades.is_empty());
    }

    #[test]
    fn signal_on_first_evaluated_bar_trades() {
        // Warm-up bar 0 carries the previous signal for bar 1.
        let s = series(&[(100.0, Some(1)), (100.0, Some(-1)), (90.0, Some(-1))]);
        let out = run_strategy(&s, &EngineConfig::frictionless(10_000.0), &mut SignalChange)
            .unwrap();
        let trades = out.trade_records();
        assert_eq!(trades.len(), 1);
        assert!(!trades[0].is_long);
        assert_eq!((trades[0].entry_bar, trades[0].exit_bar), (1, 2));
    }

    #[test]
    fn buy_and_hold_holds_to_the_end() {
        let s = series(&[(100.0, None), (100.0, None), (90.0, None), (150.0, None)]);
        let mut strategy = BuyAndHold::default();
        let out = run_strategy(&s, &EngineConfig::frictionless(10_000.0), &mut strategy).unwrap();
        let trades = out.trade_records();
        assert_eq!(trades.len(), 1);
        assert_eq!((trades[0].entry_bar, trades[0].exit_bar), (1, 3));
        assert!((out.final_balance - 15_000.0).abs() < 1e-9);
    }

    #[test]
    fn kind_round_trips_through_toml_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: StrategyKind,
        }
        let w: Wrapper = toml::from_str("kind = \"buy_and_hold\"").unwrap();
        assert_eq!(w.kind, StrategyKind::BuyAndHold);
        assert_eq!(w.kind.build().name(), "buy_and_hold");
        assert_eq!(StrategyKind::default(), StrategyKind::SignalChange);
    }
}
