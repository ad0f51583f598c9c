//! History builder — one row per input bar aligning prices, accounting and positions.

use crate::domain::{Direction, Series, TradeRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One row of the History table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub balance: f64,
    pub equity: f64,
    /// Cumulative commission spent up to this bar.
    pub commission: f64,
    pub long: bool,
    pub short: bool,
    /// `1` long, `-1` short, `0` flat.
    pub signal: i8,
    /// Passive reference: the initial balance fully invested at the first close.
    pub buy_hold: f64,
}

/// History table, index-aligned with the input series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    rows: Vec<HistoryRow>,
}

impl History {
    /// Assemble the table from the series, the account's per-bar arrays and
    /// the closed trades.
    ///
    /// Each trade marks `[entry_bar, exit_bar)`; the exit bar itself is left
    /// untouched. Overlapping trades resolve last-write-wins in close order.
    pub fn build(
        series: &Series,
        balance: &[f64],
        equity: &[f64],
        commission: &[f64],
        trades: &[TradeRecord],
        initial_balance: f64,
    ) -> Self {
        debug_assert_eq!(balance.len(), series.len());
        debug_assert_eq!(equity.len(), series.len());
        debug_assert_eq!(commission.len(), series.len());

        let units = initial_balance / series.first().close;
        let mut rows: Vec<HistoryRow> = series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| HistoryRow {
                timestamp: bar.timestamp,
                close: bar.close,
                balance: balance[i],
                equity: equity[i],
                commission: commission[i],
                long: false,
                short: false,
                signal: 0,
                buy_hold: units * bar.close,
            })
            .collect();

        mark_positions(&mut rows, trades);
        Self { rows }
    }

    /// Rebuild a history from an existing one and a Trades table, replacing
    /// the position columns.
    pub fn from_trade_records(base: &History, trades: &[TradeRecord]) -> Self {
        let mut rows: Vec<HistoryRow> = base
            .rows
            .iter()
            .cloned()
            .map(|mut row| {
                row.long = false;
                row.short = false;
                row.signal = 0;
                row
            })
            .collect();
        mark_positions(&mut rows, trades);
        Self { rows }
    }

    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.rows.iter().map(|r| r.timestamp).collect()
    }

    pub fn equity(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.equity).collect()
    }

    pub fn balance(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.balance).collect()
    }

    pub fn signals(&self) -> Vec<i8> {
        self.rows.iter().map(|r| r.signal).collect()
    }
}

fn mark_positions(rows: &mut [HistoryRow], trades: &[TradeRecord]) {
    let n = rows.len();
    for trade in trades {
        let end = trade.exit_bar.min(n);
        if trade.entry_bar >= end {
            continue;
        }
        for row in &mut rows[trade.entry_bar..end] {
            match trade.direction() {
                Direction::Long => row.long = true,
                Direction::Short => row.short = true,
            }
            row.signal = trade.direction().signal();
        }
    }
}
