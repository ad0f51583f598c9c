//! Trade — one position from entry to exit, and its flat report row.

use super::ids::TradeId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn is_long(self) -> bool {
        matches!(self, Direction::Long)
    }

    /// History signal value for this side: `1` long, `-1` short.
    pub fn signal(self) -> i8 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }
}

/// Exit side of a trade, set exactly once when the trade is closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeExit {
    pub value: f64,
    pub price: f64,
    pub bar: usize,
    pub time: NaiveDateTime,
}

/// A single position from entry to exit.
///
/// `entry_value` is the capital actually put to work, net of the entry
/// commission. The trade is open while `exit` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub direction: Direction,

    // ── Entry ──
    pub entry_value: f64,
    pub entry_price: f64,
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_commission: f64,

    // ── Exit ──
    pub exit: Option<TradeExit>,
    pub exit_commission: f64,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit.is_none()
    }

    pub fn is_long(&self) -> bool {
        self.direction.is_long()
    }

    pub fn exit_price(&self) -> Option<f64> {
        self.exit.map(|e| e.price)
    }

    /// Price the trade is valued at: the frozen exit price once closed,
    /// otherwise the caller's reference (normally the clock's last price).
    fn valuation_price(&self, reference_price: f64) -> f64 {
        match self.exit {
            Some(exit) => exit.price,
            None => reference_price,
        }
    }

    /// Fractional return: `price/entry - 1` long, `entry/price - 1` short.
    pub fn pnl_pct(&self, reference_price: f64) -> f64 {
        let price = self.valuation_price(reference_price);
        let ratio = match self.direction {
            Direction::Long => price / self.entry_price,
            Direction::Short => self.entry_price / price,
        };
        ratio - 1.0
    }

    /// Unrealized (open) or realized (closed) profit in cash units.
    pub fn pnl_value(&self, reference_price: f64) -> f64 {
        self.entry_value * self.pnl_pct(reference_price)
    }

    pub fn total_commissions(&self) -> f64 {
        self.entry_commission + self.exit_commission
    }

    /// Flat report row. `None` while the trade is still open.
    pub fn to_record(&self) -> Option<TradeRecord> {
        let exit = self.exit?;
        Some(TradeRecord {
            is_long: self.is_long(),
            entry_value: self.entry_value,
            entry_price: self.entry_price,
            entry_bar: self.entry_bar,
            entry_commission: self.entry_commission,
            entry_time: self.entry_time,
            exit_value: exit.value,
            exit_price: exit.price,
            exit_commission: self.exit_commission,
            exit_bar: exit.bar,
            exit_time: exit.time,
            pnl: self.pnl_value(exit.price),
            return_pct: self.pnl_pct(exit.price),
        })
    }
}

/// One row of the Trades table.
///
/// Column order matches the exported CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub is_long: bool,
    pub entry_value: f64,
    pub entry_price: f64,
    pub entry_bar: usize,
    pub entry_commission: f64,
    pub entry_time: NaiveDateTime,
    pub exit_value: f64,
    pub exit_price: f64,
    pub exit_commission: f64,
    pub exit_bar: usize,
    pub exit_time: NaiveDateTime,
    pub pnl: f64,
    pub return_pct: f64,
}

impl TradeRecord {
    pub fn direction(&self) -> Direction {
        if self.is_long {
            Direction::Long
        } else {
            Direction::Short
        }
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn duration(&self) -> chrono::Duration {
        self.exit_time - self.entry_time
    }
}
