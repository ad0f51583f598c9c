//! Performance statistics — pure functions over the History and Trades tables.
//!
//! [`compute_stats`] produces a typed [`Stats`] record; [`Stats::entries`]
//! gives the same numbers as an ordered `name → value` list for reports.
//! Degenerate inputs never fail: undefined ratios come out as NaN and
//! undefined durations as `None`.

use barlab_core::domain::TradeRecord;
use barlab_core::engine::History;
use chrono::{Datelike, Duration, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default risk-free rate used by the runner and CLI.
pub const DEFAULT_RISK_FREE_RATE: f64 = 5.0;

/// Number of trailing timestamps used to estimate the sampling period.
const PERIOD_SAMPLE: usize = 100;

#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("cannot compute statistics over an empty history")]
    EmptyHistory,
}

/// Full statistics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    #[serde(with = "nan_as_null")]
    pub exposure_time_pct: f64,
    #[serde(with = "nan_as_null")]
    pub equity_start: f64,
    #[serde(with = "nan_as_null")]
    pub equity_peak: f64,
    #[serde(with = "nan_as_null")]
    pub equity_final: f64,
    #[serde(with = "nan_as_null")]
    pub equity_return_pct: f64,
    #[serde(with = "nan_as_null")]
    pub balance_start: f64,
    #[serde(with = "nan_as_null")]
    pub balance_peak: f64,
    #[serde(with = "nan_as_null")]
    pub balance_final: f64,
    #[serde(with = "nan_as_null")]
    pub balance_return_pct: f64,
    #[serde(with = "nan_as_null")]
    pub gross_return_pct: f64,
    #[serde(with = "nan_as_null")]
    pub total_commissions: f64,
    #[serde(with = "nan_as_null")]
    pub return_ann_pct: f64,
    #[serde(with = "nan_as_null")]
    pub volatility_ann_pct: f64,
    #[serde(with = "nan_as_null")]
    pub cagr_pct: f64,
    #[serde(with = "nan_as_null")]
    pub sharpe: f64,
    #[serde(with = "nan_as_null")]
    pub sortino: f64,
    #[serde(with = "nan_as_null")]
    pub calmar: f64,
    /// Reported as a negative percentage.
    #[serde(with = "nan_as_null")]
    pub max_drawdown_pct: f64,
    /// Reported as a negative percentage.
    #[serde(with = "nan_as_null")]
    pub avg_drawdown_pct: f64,
    #[serde(with = "opt_duration_ms")]
    pub max_drawdown_duration: Option<Duration>,
    #[serde(with = "opt_duration_ms")]
    pub avg_drawdown_duration: Option<Duration>,
    pub total_trades: usize,
    #[serde(with = "nan_as_null")]
    pub win_rate_pct: f64,
    #[serde(with = "nan_as_null")]
    pub best_trade_pct: f64,
    #[serde(with = "nan_as_null")]
    pub worst_trade_pct: f64,
    #[serde(with = "nan_as_null")]
    pub avg_trade_pct: f64,
    #[serde(with = "opt_duration_ms")]
    pub max_trade_duration: Option<Duration>,
    #[serde(with = "opt_duration_ms")]
    pub avg_trade_duration: Option<Duration>,
    #[serde(with = "nan_as_null")]
    pub profit_factor: f64,
    #[serde(with = "nan_as_null")]
    pub expectancy_pct: f64,
    #[serde(with = "nan_as_null")]
    pub sqn: f64,
    #[serde(with = "nan_as_null")]
    pub kelly: f64,
    pub candles: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    /// Trades per bar, rounded to two decimals.
    #[serde(with = "nan_as_null")]
    pub exposure_trades: f64,
}

/// A single value in the ordered stats listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Time(NaiveDateTime),
    Duration(Option<Duration>),
    Number(f64),
    Count(usize),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            StatValue::Duration(Some(d)) => f.write_str(&format_duration(*d)),
            StatValue::Duration(None) => f.write_str("-"),
            StatValue::Number(v) if v.is_nan() => f.write_str("NaN"),
            StatValue::Number(v) => write!(f, "{v:.4}"),
            StatValue::Count(n) => write!(f, "{n}"),
        }
    }
}

impl Stats {
    /// Ordered `(name, value)` listing, in report order.
    pub fn entries(&self) -> Vec<(&'static str, StatValue)> {
        use StatValue::{Count, Duration as Dur, Number, Time};
        vec![
            ("Start", Time(self.start)),
            ("End", Time(self.end)),
            ("Duration", Dur(Some(self.duration))),
            ("Exposure Time [%]", Number(self.exposure_time_pct)),
            ("Equity Start", Number(self.equity_start)),
            ("Equity Peak", Number(self.equity_peak)),
            ("Equity Final", Number(self.equity_final)),
            ("Equity Return [%]", Number(self.equity_return_pct)),
            ("Balance Start", Number(self.balance_start)),
            ("Balance Peak", Number(self.balance_peak)),
            ("Balance Final", Number(self.balance_final)),
            ("Balance Return [%]", Number(self.balance_return_pct)),
            ("Gross Return [%]", Number(self.gross_return_pct)),
            ("Total Commissions", Number(self.total_commissions)),
            ("Return (Ann.) [%]", Number(self.return_ann_pct)),
            ("Volatility (Ann.) [%]", Number(self.volatility_ann_pct)),
            ("CAGR [%]", Number(self.cagr_pct)),
            ("Sharpe Ratio", Number(self.sharpe)),
            ("Sortino Ratio", Number(self.sortino)),
            ("Calmar Ratio", Number(self.calmar)),
            ("Max. Drawdown [%]", Number(self.max_drawdown_pct)),
            ("Avg. Drawdown [%]", Number(self.avg_drawdown_pct)),
            ("Max. Drawdown Duration", Dur(self.max_drawdown_duration)),
            ("Avg. Drawdown Duration", Dur(self.avg_drawdown_duration)),
            ("Total Trades", Count(self.total_trades)),
            ("Win Rate [%]", Number(self.win_rate_pct)),
            ("Best Trade [%]", Number(self.best_trade_pct)),
            ("Worst Trade [%]", Number(self.worst_trade_pct)),
            ("Avg. Trade [%]", Number(self.avg_trade_pct)),
            ("Max. Trade Duration", Dur(self.max_trade_duration)),
            ("Avg. Trade Duration", Dur(self.avg_trade_duration)),
            ("Profit Factor", Number(self.profit_factor)),
            ("Expectancy [%]", Number(self.expectancy_pct)),
            ("SQN", Number(self.sqn)),
            ("Kelly Criterion", Number(self.kelly)),
            ("Candles", Count(self.candles)),
            ("Long Trades", Count(self.long_trades)),
            ("Short Trades", Count(self.short_trades)),
            ("Exposure Trades [%]", Number(self.exposure_trades)),
        ]
    }

    /// Look up one entry by its report name.
    pub fn get(&self, name: &str) -> Option<StatValue> {
        self.entries()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}

/// Compute every statistic for a finished run.
///
/// `risk_free_rate` enters Sharpe as `rf × 100` percentage points and
/// Sortino as a plain fraction.
pub fn compute_stats(
    history: &History,
    trades: &[TradeRecord],
    risk_free_rate: f64,
) -> Result<Stats, StatsError> {
    let rows = history.rows();
    let (first, last) = match (rows.first(), rows.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(StatsError::EmptyHistory),
    };
    let n = rows.len();
    let timestamps = history.timestamps();
    let equity = history.equity();
    let balance = history.balance();
    let period = data_period(&timestamps);
    let round = |d: Duration| match period {
        Some(p) => ceil_to_resolution(d, p),
        None => d,
    };

    // ── Equity and balance ──
    let duration = last.timestamp - first.timestamp;
    let equity_start = first.equity;
    let equity_final = last.equity;
    let balance_start = first.balance;
    let balance_final = last.balance;

    // ── Drawdown ──
    let dd = drawdown_series(&equity);
    let max_dd = dd.iter().copied().fold(0.0_f64, f64::max);
    let periods = drawdown_periods(&dd, &timestamps);

    // ── Periodic returns ──
    let ann = annualization(&timestamps);
    let periodic = pct_change(&resample_last(&timestamps, &equity, ann.resample));
    let gmean = geometric_mean(&periodic);
    let valid: Vec<f64> = periodic.iter().copied().filter(|r| !r.is_nan()).collect();
    let variance = match valid.len() {
        0 => f64::NAN,
        1 => 0.0,
        _ => sample_variance(&valid),
    };
    let a = ann.periods_per_year;
    let annualized_return = (1.0 + gmean).powf(a) - 1.0;
    let volatility_ann_pct = clamp_rounding_noise(
        (variance + (1.0 + gmean).powi(2)).powf(a) - (1.0 + gmean).powf(2.0 * a),
    )
    .sqrt()
        * 100.0;
    let return_ann_pct = annualized_return * 100.0;

    let years = (duration.num_seconds() as f64 / 86_400.0) / a;
    let cagr_pct = if years != 0.0 {
        ((equity_final / equity_start).powf(1.0 / years) - 1.0) * 100.0
    } else {
        f64::NAN
    };

    let sharpe = nan_if_zero_divisor(return_ann_pct - risk_free_rate * 100.0, volatility_ann_pct);
    let downside = mean(&valid.iter().map(|r| r.min(0.0).powi(2)).collect::<Vec<_>>()).sqrt()
        * a.sqrt();
    let sortino = nan_if_zero_divisor(annualized_return - risk_free_rate, downside);
    let calmar = nan_if_zero_divisor(annualized_return, max_dd);

    // ── Trades ──
    let total_trades = trades.len();
    let returns: Vec<f64> = trades.iter().map(|t| t.return_pct).collect();
    let pnl: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
    let win_rate = if total_trades == 0 {
        f64::NAN
    } else {
        trades.iter().filter(|t| t.is_winner()).count() as f64 / total_trades as f64
    };
    let durations: Vec<Duration> = trades.iter().map(TradeRecord::duration).collect();
    let long_trades = trades.iter().filter(|t| t.is_long).count();
    let short_trades = total_trades - long_trades;

    Ok(Stats {
        start: first.timestamp,
        end: last.timestamp,
        duration,
        exposure_time_pct: exposure_fraction(n, trades) * 100.0,
        equity_start,
        equity_peak: equity.iter().copied().fold(f64::NAN, f64::max),
        equity_final,
        equity_return_pct: (equity_final - equity_start) / equity_start * 100.0,
        balance_start,
        balance_peak: balance.iter().copied().fold(f64::NAN, f64::max),
        balance_final,
        balance_return_pct: (balance_final - balance_start) / balance_start * 100.0,
        gross_return_pct: round2(returns.iter().sum::<f64>() * 100.0),
        total_commissions: last.commission,
        return_ann_pct,
        volatility_ann_pct,
        cagr_pct,
        sharpe,
        sortino,
        calmar,
        max_drawdown_pct: if max_dd > 0.0 { -max_dd * 100.0 } else { 0.0 },
        avg_drawdown_pct: -mean(&periods.peaks) * 100.0,
        max_drawdown_duration: periods.durations.iter().copied().max().map(round),
        avg_drawdown_duration: mean_duration(&periods.durations).map(round),
        total_trades,
        win_rate_pct: win_rate * 100.0,
        best_trade_pct: returns.iter().copied().fold(f64::NAN, f64::max) * 100.0,
        worst_trade_pct: returns.iter().copied().fold(f64::NAN, f64::min) * 100.0,
        avg_trade_pct: geometric_mean(&returns) * 100.0,
        max_trade_duration: durations.iter().copied().max().map(round),
        avg_trade_duration: mean_duration(&durations).map(round),
        profit_factor: profit_factor(&returns),
        expectancy_pct: mean(&returns) * 100.0,
        sqn: sqn(&pnl),
        kelly: kelly(win_rate, &pnl),
        candles: n,
        long_trades,
        short_trades,
        exposure_trades: round2(total_trades as f64 / n as f64),
    })
}

// ─── Drawdown ───────────────────────────────────────────────────────

/// Fractional drawdown from the running equity peak at every bar.
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&e| {
            peak = peak.max(e);
            if peak > 0.0 {
                1.0 - e / peak
            } else {
                0.0
            }
        })
        .collect()
}

/// Durations and depths of each drawdown period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawdownPeriods {
    pub durations: Vec<Duration>,
    pub peaks: Vec<f64>,
}

/// Split the drawdown series at its zero points (plus the final bar).
///
/// A period spans two consecutive split points more than one bar apart.
/// When there is none, the peaks fall back to the non-zero drawdowns and no
/// duration is reported.
pub fn drawdown_periods(dd: &[f64], timestamps: &[NaiveDateTime]) -> DrawdownPeriods {
    let mut points: Vec<usize> = dd
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == 0.0)
        .map(|(i, _)| i)
        .collect();
    if !dd.is_empty() {
        points.push(dd.len() - 1);
    }
    points.dedup();

    let mut periods = DrawdownPeriods::default();
    for pair in points.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        if cur > prev + 1 {
            periods.durations.push(timestamps[cur] - timestamps[prev]);
            periods
                .peaks
                .push(dd[prev..=cur].iter().copied().fold(f64::NAN, f64::max));
        }
    }

    if periods.peaks.is_empty() {
        periods.peaks = dd.iter().copied().filter(|&d| d != 0.0).collect();
    }
    periods
}

// ─── Annualization ──────────────────────────────────────────────────

/// Calendar bucket equity is resampled to before computing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resample {
    Daily,
    /// Weeks ending on Sunday.
    Weekly,
    Monthly,
    Yearly,
}

impl Resample {
    fn period_key(self, t: NaiveDateTime) -> i64 {
        let date = t.date();
        match self {
            Resample::Daily => date.num_days_from_ce() as i64,
            Resample::Weekly => {
                let to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
                date.num_days_from_ce() as i64 + to_sunday
            }
            Resample::Monthly => date.year() as i64 * 12 + date.month() as i64,
            Resample::Yearly => date.year() as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annualization {
    pub periods_per_year: f64,
    pub resample: Resample,
}

/// Infer periods per year from the sampling period.
///
/// Whole-day spacing of 7, 31 and 365 maps to weekly, monthly and yearly.
/// Anything else is daily: 365 when more than `2/7 × 0.6` of bars fall on a
/// weekend, 252 otherwise.
pub fn annualization(timestamps: &[NaiveDateTime]) -> Annualization {
    let freq_days = data_period(timestamps).map_or(0, |p| p.num_days());
    let (periods_per_year, resample) = match freq_days {
        7 => (52.0, Resample::Weekly),
        31 => (12.0, Resample::Monthly),
        365 => (1.0, Resample::Yearly),
        _ => {
            let weekend = timestamps
                .iter()
                .filter(|t| matches!(t.weekday(), Weekday::Sat | Weekday::Sun))
                .count();
            let share = weekend as f64 / timestamps.len().max(1) as f64;
            let days = if share > 2.0 / 7.0 * 0.6 { 365.0 } else { 252.0 };
            (days, Resample::Daily)
        }
    };
    Annualization {
        periods_per_year,
        resample,
    }
}

/// Median spacing of the last [`PERIOD_SAMPLE`] timestamps.
pub fn data_period(timestamps: &[NaiveDateTime]) -> Option<Duration> {
    let tail = &timestamps[timestamps.len().saturating_sub(PERIOD_SAMPLE)..];
    let mut diffs: Vec<i64> = tail
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds())
        .collect();
    if diffs.is_empty() {
        return None;
    }
    diffs.sort_unstable();
    let mid = diffs.len() / 2;
    let median = if diffs.len() % 2 == 0 {
        (diffs[mid - 1] + diffs[mid]) / 2
    } else {
        diffs[mid]
    };
    Some(Duration::milliseconds(median))
}

/// Round `value` up to the coarsest unit (day, hour, minute, second,
/// millisecond) that divides `period` evenly.
pub fn ceil_to_resolution(value: Duration, period: Duration) -> Duration {
    let p = period.num_milliseconds();
    if p <= 0 {
        return value;
    }
    let unit = [86_400_000, 3_600_000, 60_000, 1_000]
        .into_iter()
        .find(|u| p % u == 0)
        .unwrap_or(1);
    let v = value.num_milliseconds();
    let q = v.div_euclid(unit) + i64::from(v.rem_euclid(unit) != 0);
    Duration::milliseconds(q * unit)
}

/// Last value per calendar bucket; timestamps must be increasing.
fn resample_last(timestamps: &[NaiveDateTime], values: &[f64], resample: Resample) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    let mut current_key = None;
    for (t, &v) in timestamps.iter().zip(values) {
        let key = resample.period_key(*t);
        match out.last_mut() {
            Some(slot) if current_key == Some(key) => *slot = v,
            _ => {
                out.push(v);
                current_key = Some(key);
            }
        }
    }
    out
}

/// Simple returns; the first entry is NaN.
fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if !values.is_empty() {
        out.push(f64::NAN);
    }
    out.extend(values.windows(2).map(|w| w[1] / w[0] - 1.0));
    out
}

// ─── Trade-level ────────────────────────────────────────────────────

/// Fraction of bars covered by a trade, `[entry_bar, exit_bar]` inclusive.
fn exposure_fraction(bars: usize, trades: &[TradeRecord]) -> f64 {
    let mut held = vec![false; bars];
    for t in trades {
        let end = (t.exit_bar + 1).min(bars);
        if t.entry_bar < end {
            held[t.entry_bar..end].iter_mut().for_each(|h| *h = true);
        }
    }
    held.iter().filter(|&&h| h).count() as f64 / bars as f64
}

/// Sum of winning returns over the absolute sum of losing ones.
fn profit_factor(returns: &[f64]) -> f64 {
    let gains: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
    let losses: f64 = returns.iter().filter(|&&r| r < 0.0).sum();
    nan_if_zero_divisor(gains, losses.abs())
}

/// System Quality Number: `sqrt(n) × mean(pnl) / std(pnl)`.
fn sqn(pnl: &[f64]) -> f64 {
    if pnl.len() < 2 {
        return f64::NAN;
    }
    let std = sample_variance(pnl).sqrt();
    nan_if_zero_divisor((pnl.len() as f64).sqrt() * mean(pnl), std)
}

fn kelly(win_rate: f64, pnl: &[f64]) -> f64 {
    let wins: Vec<f64> = pnl.iter().copied().filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = pnl.iter().copied().filter(|&p| p < 0.0).collect();
    win_rate - (1.0 - win_rate) / (mean(&wins) / -mean(&losses))
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Geometric mean of simple returns. NaN entries count as zero returns;
/// any return at or below -100% gives 0. NaN for an empty slice.
pub fn geometric_mean(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    let growth: Vec<f64> = returns
        .iter()
        .map(|r| if r.is_nan() { 1.0 } else { 1.0 + r })
        .collect();
    if growth.iter().any(|&g| g <= 0.0) {
        return 0.0;
    }
    (growth.iter().map(|g| g.ln()).sum::<f64>() / growth.len() as f64).exp() - 1.0
}

/// Arithmetic mean; NaN for an empty slice.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Variance with one degree of freedom removed.
fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn mean_duration(durations: &[Duration]) -> Option<Duration> {
    if durations.is_empty() {
        return None;
    }
    let total: i64 = durations.iter().map(|d| d.num_milliseconds()).sum();
    Some(Duration::milliseconds(total / durations.len() as i64))
}

fn nan_if_zero_divisor(numerator: f64, divisor: f64) -> f64 {
    if divisor == 0.0 || divisor.is_nan() {
        f64::NAN
    } else {
        numerator / divisor
    }
}

/// Negative rounding residue becomes zero; NaN passes through.
fn clamp_rounding_noise(value: f64) -> f64 {
    if value < 0.0 {
        0.0
    } else {
        value
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds();
    let days = secs.div_euclid(86_400);
    let rem = secs.rem_euclid(86_400);
    format!(
        "{days} days {:02}:{:02}:{:02}",
        rem / 3_600,
        (rem % 3_600) / 60,
        rem % 60
    )
}

// ─── Serde adapters ─────────────────────────────────────────────────

/// JSON has no NaN: write non-finite numbers as `null`, read `null` back as NaN.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_some(value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

/// Durations as whole milliseconds.
mod duration_ms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::milliseconds(i64::deserialize(d)?))
    }
}

mod opt_duration_ms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.num_milliseconds()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<i64>::deserialize(d)?.map(Duration::milliseconds))
    }
}
