//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for backtest results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: Trades and History tables for external analysis tools
//! - **Markdown**: human-readable single-run report
//!
//! All persisted artifacts include a `schema_version` field. Newer versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use barlab_core::domain::TradeRecord;
use barlab_core::engine::HistoryRow;
use tracing::info;

use crate::metrics::Stats;
use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting newer schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// Serialize the statistics on their own.
pub fn export_stats_json(stats: &Stats) -> Result<String> {
    serde_json::to_string_pretty(stats).context("failed to serialize Stats to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the Trades table as CSV.
///
/// Columns: is_long, entry_value, entry_price, entry_bar, entry_commission,
/// entry_time, exit_value, exit_price, exit_commission, exit_bar, exit_time,
/// pnl, return_pct
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    write_csv(trades)
}

/// Parse a Trades table previously written by [`export_trades_csv`].
pub fn import_trades_csv(text: &str) -> Result<Vec<TradeRecord>> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    rdr.deserialize()
        .collect::<std::result::Result<Vec<TradeRecord>, _>>()
        .context("failed to parse trades CSV")
}

/// Export the History table as CSV, one row per bar.
///
/// Columns: timestamp, close, balance, equity, commission, long, short,
/// signal, buy_hold
pub fn export_history_csv(rows: &[HistoryRow]) -> Result<String> {
    write_csv(rows)
}

fn write_csv<T: serde::Serialize>(rows: &[T]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates a directory named by the short run id under `output_dir`
/// containing:
/// - `result.json`: the full `BacktestResult`
/// - `stats.json`: statistics only
/// - `trades.csv`: Trades table
/// - `history.csv`: History table
/// - `report.md`: Markdown summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(result.fingerprint.run_id.short());
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        ("result.json", export_json(result)?),
        ("stats.json", export_stats_json(&result.stats)?),
        ("trades.csv", export_trades_csv(&result.trades)?),
        ("history.csv", export_history_csv(result.history.rows())?),
        ("report.md", generate_report(result)),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    info!(dir = %run_dir.display(), "saved artifacts");
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's result.json.
///
/// Rejects newer schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let fp = &result.fingerprint;
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", fp.run_id));
    md.push_str(&format!("| Strategy | {} |\n", fp.strategy));
    md.push_str(&format!("| Bars | {} |\n", fp.bar_count));
    md.push_str(&format!("| Dataset Hash | {} |\n", fp.dataset_hash));
    md.push_str(&format!(
        "| Initial Balance | {:.2} |\n",
        result.config.initial_balance
    ));
    md.push_str(&format!("| Commission | {} |\n", result.config.commission));
    md.push_str(&format!(
        "| Position Mode | {:?} |\n",
        result.config.position_mode
    ));
    md.push('\n');

    md.push_str("## Statistics\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    for (name, value) in result.stats.entries() {
        md.push_str(&format!("| {name} | {value} |\n"));
    }
    md.push('\n');

    if !result.open_trades.is_empty() {
        md.push_str(&format!(
            "**{} trade(s) left open at the end of the run.**\n",
            result.open_trades.len()
        ));
    }

    md
}
