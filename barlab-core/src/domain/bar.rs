//! Bar and Series — the fundamental market data units.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row of the input series.
///
/// Only `close` is required; the other price fields are carried through for
/// strategies that want them. `signal` is an optional precomputed annotation
/// (`-1`, `0`, `1`) produced upstream of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub signal: Option<i8>,
}

impl Bar {
    /// Bar with only a timestamp and a close.
    pub fn from_close(timestamp: NaiveDateTime, close: f64) -> Self {
        Self {
            timestamp,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
            signal: None,
        }
    }

    pub fn with_signal(mut self, signal: i8) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Signal annotation, treating a missing value as flat.
    pub fn signal_or_flat(&self) -> i8 {
        self.signal.unwrap_or(0)
    }

    /// A close that the accounting can divide by.
    pub fn has_valid_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// Setup errors for the input series. Raised before any bar is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series is empty")]
    Empty,

    #[error("timestamps must be strictly increasing: bar {index} ({current}) does not follow {previous}")]
    NonIncreasingTimestamp {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("bar {index} has an invalid close price {close}")]
    InvalidClose { index: usize, close: f64 },
}

/// Validated, read-only price history.
///
/// Timestamps are unique and strictly increasing and every close is finite
/// and positive. The series is never mutated by a run, so several runs may
/// share one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (index, bar) in bars.iter().enumerate() {
            if !bar.has_valid_close() {
                return Err(SeriesError::InvalidClose {
                    index,
                    close: bar.close,
                });
            }
            if index > 0 {
                let previous = bars[index - 1].timestamp;
                if bar.timestamp <= previous {
                    return Err(SeriesError::NonIncreasingTimestamp {
                        index,
                        previous,
                        current: bar.timestamp,
                    });
                }
            }
        }
        Ok(Self { bars })
    }

    /// Build a series from `(timestamp, close)` pairs.
    pub fn from_closes(
        points: impl IntoIterator<Item = (NaiveDateTime, f64)>,
    ) -> Result<Self, SeriesError> {
        Self::new(
            points
                .into_iter()
                .map(|(ts, close)| Bar::from_close(ts, close))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.bars.iter().map(|b| b.timestamp)
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.close)
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

impl<'de> Deserialize<'de> for Series {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bars = Vec::<Bar>::deserialize(deserializer)?;
        Series::new(bars).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ts(day: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(day)
    }

    #[test]
    fn series_accepts_increasing_timestamps() {
        let series = Series::from_closes([(ts(0), 100.0), (ts(1), 101.0), (ts(2), 99.5)]).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.last().close, 99.5);
    }

    #[test]
    fn series_rejects_empty() {
        assert_eq!(Series::new(vec![]), Err(SeriesError::Empty));
    }

    #[test]
    fn series_rejects_duplicate_timestamp() {
        let err = Series::from_closes([(ts(0), 100.0), (ts(0), 101.0)]).unwrap_err();
        assert!(matches!(
            err,
            SeriesError::NonIncreasingTimestamp { index: 1, .. }
        ));
    }

    #[test]
    fn series_rejects_backwards_timestamp() {
        let err = Series::from_closes([(ts(2), 100.0), (ts(1), 101.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::NonIncreasingTimestamp { .. }));
    }

    #[test]
    fn series_rejects_bad_close() {
        let err = Series::from_closes([(ts(0), 100.0), (ts(1), f64::NAN)]).unwrap_err();
        assert!(matches!(err, SeriesError::InvalidClose { index: 1, .. }));

        let err = Series::from_closes([(ts(0), 0.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::InvalidClose { index: 0, .. }));
    }

    #[test]
    fn missing_signal_is_flat() {
        let bar = Bar::from_close(ts(0), 100.0);
        assert_eq!(bar.signal_or_flat(), 0);
        assert_eq!(bar.with_signal(-1).signal_or_flat(), -1);
    }

    #[test]
    fn series_deserialization_validates() {
        let good = Series::from_closes([(ts(0), 100.0), (ts(1), 101.0)]).unwrap();
        let json = serde_json::to_string(&good).unwrap();
        let back: Series = serde_json::from_str(&json).unwrap();
        assert_eq!(back, good);

        let bad = vec![Bar::from_close(ts(1), 100.0), Bar::from_close(ts(0), 100.0)];
        let bad_json = serde_json::to_string(&bad).unwrap();
        assert!(serde_json::from_str::<Series>(&bad_json).is_err());
    }
}
