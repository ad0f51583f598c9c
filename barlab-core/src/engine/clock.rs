//! Simulation clock — current bar, lookback window, last known price.

use crate::domain::{Bar, Series};
use chrono::NaiveDateTime;
use std::ops::Range;

/// Read-only view of where the run currently is.
///
/// Before the first `advance` the clock sits on bar 0 (warm-up) with the
/// first close as its last price.
#[derive(Debug, Clone)]
pub struct SimClock {
    current_bar: usize,
    is_last_bar: bool,
    last_price: f64,
    total_bars: usize,
    window_size: usize,
    window: Range<usize>,
    current_time: NaiveDateTime,
}

impl SimClock {
    pub fn new(series: &Series, window_size: usize) -> Self {
        let first = series.first();
        Self {
            current_bar: 0,
            is_last_bar: series.len() == 1,
            last_price: first.close,
            total_bars: series.len(),
            window_size,
            window: 0..1,
            current_time: first.timestamp,
        }
    }

    /// Move to bar `index`: window becomes `[max(0, index - N), index]`.
    pub fn advance(&mut self, series: &Series, index: usize) {
        debug_assert!(index < self.total_bars, "bar {index} out of range");
        let start = index.saturating_sub(self.window_size);
        self.current_bar = index;
        self.window = start..index + 1;
        self.is_last_bar = index + 1 == self.total_bars;
        let bar = &series.bars()[index];
        self.last_price = bar.close;
        self.current_time = bar.timestamp;
    }

    pub fn current_bar(&self) -> usize {
        self.current_bar
    }

    pub fn is_last_bar(&self) -> bool {
        self.is_last_bar
    }

    pub fn last_price(&self) -> f64 {
        self.last_price
    }

    pub fn total_bars(&self) -> usize {
        self.total_bars
    }

    pub fn current_time(&self) -> NaiveDateTime {
        self.current_time
    }

    pub fn window_range(&self) -> Range<usize> {
        self.window.clone()
    }

    /// Bars visible to the strategy: up to N previous bars plus the current one.
    pub fn window<'s>(&self, series: &'s Series) -> &'s [Bar] {
        &series.bars()[self.window.clone()]
    }
}
