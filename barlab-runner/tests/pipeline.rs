//! End-to-end: CSV file and TOML config in, artifact directory out.

use std::fs;
use std::path::Path;

use barlab_runner::{
    import_trades_csv, load_artifacts, load_csv, run_from_config, save_artifacts, sweep,
    BacktestConfig, StrategyKind, SweepGrid, SCHEMA_VERSION,
};

const PRICES: &str = "\
date,close,signal
2024-01-01,100.0,0
2024-01-02,101.0,1
2024-01-03,103.0,1
2024-01-04,102.0,1
2024-01-05,99.0,-1
2024-01-08,97.0,-1
2024-01-09,98.0,0
2024-01-10,100.0,1
2024-01-11,104.0,1
2024-01-12,105.0,1
";

fn write_prices(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("prices.csv");
    fs::write(&path, PRICES).unwrap();
    path
}

fn write_config(dir: &Path, prices: &Path) -> std::path::PathBuf {
    let path = dir.join("barlab.toml");
    let text = format!(
        "[data]\npath = {:?}\n\n[engine]\ninitial_balance = 10000.0\ncommission = 0.001\n\n\
         [strategy]\nkind = \"signal_change\"\n\n[stats]\nrisk_free_rate = 0.0\n",
        prices.display().to_string()
    );
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn config_file_to_artifacts_and_back() {
    let tmp = tempfile::tempdir().unwrap();
    let prices = write_prices(tmp.path());
    let config = BacktestConfig::load(&write_config(tmp.path(), &prices)).unwrap();
    assert_eq!(config.strategy.kind, StrategyKind::SignalChange);

    let result = run_from_config(&config).unwrap();
    assert_eq!(result.history.len(), 10);
    // Long at bar 1, short at bar 4, flat at 6, long at 7, force-closed at the end.
    assert_eq!(result.trades.len(), 3);
    assert_eq!(result.stats.long_trades, 2);
    assert_eq!(result.stats.short_trades, 1);
    assert!(result.open_trades.is_empty());
    assert!(result.stats.total_commissions > 0.0);

    let out = tmp.path().join("runs");
    let run_dir = save_artifacts(&result, &out).unwrap();
    assert_eq!(run_dir, out.join(result.fingerprint.run_id.short()));
    for name in ["result.json", "stats.json", "trades.csv", "history.csv", "report.md"] {
        assert!(run_dir.join(name).exists(), "missing {name}");
    }

    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.schema_version, SCHEMA_VERSION);
    assert_eq!(loaded.fingerprint, result.fingerprint);
    assert_eq!(loaded.trades, result.trades);
    assert_eq!(loaded.history, result.history);
    assert_eq!(loaded.final_equity, result.final_equity);
    assert_eq!(loaded.stats.total_trades, result.stats.total_trades);
    assert_eq!(loaded.stats.max_drawdown_pct, result.stats.max_drawdown_pct);

    let trades = import_trades_csv(&fs::read_to_string(run_dir.join("trades.csv")).unwrap())
        .unwrap();
    assert_eq!(trades.len(), result.trades.len());
    assert_eq!(trades[1].entry_bar, result.trades[1].entry_bar);
    assert_eq!(trades[1].exit_bar, result.trades[1].exit_bar);
}

#[test]
fn same_inputs_give_same_run_id() {
    let tmp = tempfile::tempdir().unwrap();
    let prices = write_prices(tmp.path());
    let config = BacktestConfig::load(&write_config(tmp.path(), &prices)).unwrap();

    let a = run_from_config(&config).unwrap();
    let b = run_from_config(&config).unwrap();
    assert_eq!(a.fingerprint.run_id, b.fingerprint.run_id);

    let mut cheaper = config.clone();
    cheaper.engine.commission = 0.0;
    let c = run_from_config(&cheaper).unwrap();
    assert_ne!(a.fingerprint.run_id, c.fingerprint.run_id);
    assert_eq!(a.fingerprint.dataset_hash, c.fingerprint.dataset_hash);
}

#[test]
fn load_rejects_newer_schema() {
    let tmp = tempfile::tempdir().unwrap();
    let prices = write_prices(tmp.path());
    let config = BacktestConfig::load(&write_config(tmp.path(), &prices)).unwrap();
    let result = run_from_config(&config).unwrap();
    let run_dir = save_artifacts(&result, tmp.path()).unwrap();

    let path = run_dir.join("result.json");
    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    value["schema_version"] = serde_json::json!(SCHEMA_VERSION + 1);
    fs::write(&path, value.to_string()).unwrap();

    let err = load_artifacts(&run_dir).unwrap_err();
    assert!(format!("{err:#}").contains("unsupported schema version"));
}

#[test]
fn sweep_over_loaded_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let series = load_csv(&write_prices(tmp.path())).unwrap();
    let grid = SweepGrid {
        commissions: vec![0.0, 0.002],
        default_entry_values: vec![1.0, 0.25, 2_500.0],
    };
    let rows = sweep(&series, &BacktestConfig::default(), &grid).unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|r| r.stats.total_trades == 3));
    assert_eq!(rows[0].stats.total_commissions, 0.0);
    assert_eq!(rows[3].commission, 0.002);
    assert_eq!(rows[5].default_entry_value, 2_500.0);
}
