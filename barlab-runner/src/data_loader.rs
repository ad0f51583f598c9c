//! Series loading for the runner.
//!
//! Two sources:
//! 1. CSV file with a timestamp column and a close column (optional
//!    open/high/low/volume/signal columns are carried through)
//! 2. Synthetic random walk, deterministic for a given seed
//!
//! Both end in [`Series::new`], so every loaded series is validated before
//! a run sees it.

use crate::config::{DataSource, MAX_SYNTHETIC_BARS};
use barlab_core::domain::{Bar, Series, SeriesError};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Accepted names for the timestamp column, in lookup order.
const TIMESTAMP_COLUMNS: [&str; 4] = ["timestamp", "date", "datetime", "time"];

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("line {line}: cannot parse {column} value '{value}'")]
    Parse {
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("synthetic series of {bars} bars exceeds the limit of {max}")]
    TooManyBars { bars: usize, max: usize },

    #[error("invalid series: {0}")]
    Series(#[from] SeriesError),
}

/// Load the series a run configuration points at.
pub fn load_series(source: &DataSource) -> Result<Series, LoadError> {
    match source {
        DataSource::Csv(path) => load_csv(path),
        DataSource::Synthetic { bars, seed } => synthetic_series(*bars, *seed),
    }
}

/// Read a CSV file into a validated series.
pub fn load_csv(path: &Path) -> Result<Series, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let series = read_csv(file)?;
    info!(path = %path.display(), bars = series.len(), "loaded series");
    Ok(series)
}

/// Column positions resolved from the header row.
struct Columns {
    timestamp: usize,
    close: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    volume: Option<usize>,
    signal: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        let find = |name: &str| names.iter().position(|n| n == name);

        let timestamp = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|name| find(name))
            .ok_or(LoadError::MissingColumn("timestamp"))?;
        let close = find("close").ok_or(LoadError::MissingColumn("close"))?;
        Ok(Self {
            timestamp,
            close,
            open: find("open"),
            high: find("high"),
            low: find("low"),
            volume: find("volume"),
            signal: find("signal"),
        })
    }
}

/// Parse CSV from any reader. The first row must be a header.
pub fn read_csv<R: Read>(reader: R) -> Result<Series, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let columns = Columns::resolve(rdr.headers()?)?;

    let mut bars = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let optional = |idx: Option<usize>, column: &'static str| {
            idx.map(|i| parse_optional_f64(field(i), line, column))
                .transpose()
                .map(Option::flatten)
        };

        let raw_ts = field(columns.timestamp);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| LoadError::Parse {
            line,
            column: "timestamp",
            value: raw_ts.to_string(),
        })?;
        let raw_close = field(columns.close);
        let close = raw_close.parse::<f64>().map_err(|_| LoadError::Parse {
            line,
            column: "close",
            value: raw_close.to_string(),
        })?;

        bars.push(Bar {
            timestamp,
            open: optional(columns.open, "open")?,
            high: optional(columns.high, "high")?,
            low: optional(columns.low, "low")?,
            close,
            volume: optional(columns.volume, "volume")?,
            signal: optional(columns.signal, "signal")?.map(signal_from_f64),
        });
    }

    debug!(rows = bars.len(), "parsed CSV rows");
    Ok(Series::new(bars)?)
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` (or with a `T`), or RFC 3339.
///
/// RFC 3339 offsets are normalised to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

fn parse_optional_f64(raw: &str, line: u64, column: &'static str) -> Result<Option<f64>, LoadError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>().map(Some).map_err(|_| LoadError::Parse {
        line,
        column,
        value: raw.to_string(),
    })
}

/// Collapse any numeric signal to `-1`, `0` or `1`.
fn signal_from_f64(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Deterministic random-walk series of `bars` weekday bars.
///
/// Daily returns are uniform in ±3%. The `signal` column is the sign of the
/// five-bar momentum, so the series drives the signal-change strategy too.
/// Counts above [`MAX_SYNTHETIC_BARS`] are rejected before allocating.
pub fn synthetic_series(bars: usize, seed: u64) -> Result<Series, LoadError> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    if bars > MAX_SYNTHETIC_BARS {
        return Err(LoadError::TooManyBars {
            bars,
            max: MAX_SYNTHETIC_BARS,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut out: Vec<Bar> = Vec::with_capacity(bars);
    let mut price = 100.0_f64;
    let mut current = NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN);

    while out.len() < bars {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000.0..5_000_000.0_f64).round();
        let signal = out
            .len()
            .checked_sub(5)
            .map_or(0, |i| signal_from_f64(close - out[i].close));

        out.push(Bar {
            timestamp: current,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close,
            volume: Some(volume),
            signal: Some(signal),
        });

        price = close;
        current += Duration::days(1);
    }

    debug!(bars, seed, "generated synthetic series");
    Ok(Series::new(out)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_minimal_csv() {
        let csv = "date,close\n2024-01-01,100\n2024-01-02,101.5\n";
        let series = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().close, 101.5);
        assert_eq!(series.first().signal, None);
        assert_eq!(series.first().open, None);
    }

    #[test]
    fn reads_optional_columns_in_any_order() {
        let csv = "Signal,Close,Timestamp,Volume,Open\n\
                   1,100,2024-01-01 09:30:00,1000,99\n\
                   -1.0,101,2024-01-01 09:31:00,,100\n\
                   ,102,2024-01-01 09:32:00,1200,101\n";
        let series = read_csv(csv.as_bytes()).unwrap();
        let bars = series.bars();
        assert_eq!(bars[0].signal, Some(1));
        assert_eq!(bars[1].signal, Some(-1));
        assert_eq!(bars[2].signal, None);
        assert_eq!(bars[1].volume, None);
        assert_eq!(bars[2].open, Some(101.0));
        assert_eq!(bars[0].high, None);
    }

    #[test]
    fn timestamp_formats() {
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-05"), Some(midnight));
        assert_eq!(
            parse_timestamp("2024-03-05 14:30:00"),
            Some(midnight + Duration::minutes(870))
        );
        assert_eq!(
            parse_timestamp("2024-03-05T14:30:00+02:00"),
            Some(midnight + Duration::minutes(750))
        );
        assert_eq!(parse_timestamp("05/03/2024"), None);
    }

    #[test]
    fn missing_close_column() {
        let csv = "date,price\n2024-01-01,100\n";
        assert!(matches!(
            read_csv(csv.as_bytes()),
            Err(LoadError::MissingColumn("close"))
        ));
    }

    #[test]
    fn bad_value_reports_line() {
        let csv = "date,close\n2024-01-01,100\n2024-01-02,abc\n";
        match read_csv(csv.as_bytes()) {
            Err(LoadError::Parse { line, column, value }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "close");
                assert_eq!(value, "abc");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn unordered_rows_fail_validation() {
        let csv = "date,close\n2024-01-02,100\n2024-01-01,101\n";
        assert!(matches!(
            read_csv(csv.as_bytes()),
            Err(LoadError::Series(SeriesError::NonIncreasingTimestamp { index: 1, .. }))
        ));
    }

    #[test]
    fn header_only_is_empty_series() {
        assert!(matches!(
            read_csv("date,close\n".as_bytes()),
            Err(LoadError::Series(SeriesError::Empty))
        ));
    }

    #[test]
    fn synthetic_is_deterministic_and_skips_weekends() {
        let a = synthetic_series(60, 7).unwrap();
        let b = synthetic_series(60, 7).unwrap();
        let c = synthetic_series(60, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 60);
        assert!(a
            .timestamps()
            .all(|t| !matches!(t.weekday(), Weekday::Sat | Weekday::Sun)));
        assert!(a.bars().iter().all(|b| b.signal.is_some()));
    }

    #[test]
    fn synthetic_bar_count_is_capped() {
        match synthetic_series(usize::MAX, 1) {
            Err(LoadError::TooManyBars { bars, max }) => {
                assert_eq!(bars, usize::MAX);
                assert_eq!(max, MAX_SYNTHETIC_BARS);
            }
            other => panic!("expected too-many-bars error, got {other:?}"),
        }
    }

    #[test]
    fn synthetic_zero_bars_is_rejected() {
        assert!(matches!(
            synthetic_series(0, 1),
            Err(LoadError::Series(SeriesError::Empty))
        ));
    }
}
