//! barlab CLI — run and sweep commands.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file or command-line flags
//! - `sweep`: run one strategy over a grid of commissions and entry sizes

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use barlab_core::engine::PositionMode;
use barlab_runner::{
    load_series, run_from_config, save_artifacts, sweep, BacktestConfig, BacktestResult,
    StrategyKind, SweepGrid,
};

#[derive(Parser)]
#[command(name = "barlab", about = "barlab: bar-by-bar backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest and save its artifacts.
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory for the artifact set.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the statistics as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run a commission × entry-size grid and print one row per point.
    Sweep {
        #[command(flatten)]
        input: InputArgs,

        /// Commissions to test (comma-separated, e.g. 0,0.001,0.002).
        #[arg(long, value_delimiter = ',', required = true)]
        commissions: Vec<f64>,

        /// Default entry values to test (fraction of balance if <= 1, cash otherwise).
        #[arg(long, value_delimiter = ',', default_value = "1.0")]
        entry_values: Vec<f64>,
    },
}

/// Data source and engine overrides shared by every command.
#[derive(Args)]
struct InputArgs {
    /// Path to a TOML config file. Other flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV file with a timestamp column and a close column.
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Use a synthetic random-walk series of this many bars.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for the synthetic series.
    #[arg(long)]
    seed: Option<u64>,

    /// Strategy: signal_change or buy_and_hold.
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<StrategyKind>,

    #[arg(long)]
    initial_balance: Option<f64>,

    #[arg(long)]
    commission: Option<f64>,

    /// Allow simultaneous long and short trades.
    #[arg(long, default_value_t = false)]
    hedging: bool,

    /// Leave trades open at the end instead of closing them at the last price.
    #[arg(long, default_value_t = false)]
    no_force_close: bool,

    /// Annual risk-free rate used by the Sharpe and Sortino ratios.
    #[arg(long)]
    risk_free_rate: Option<f64>,
}

fn parse_strategy(raw: &str) -> Result<StrategyKind, String> {
    match raw {
        "signal_change" => Ok(StrategyKind::SignalChange),
        "buy_and_hold" => Ok(StrategyKind::BuyAndHold),
        other => Err(format!(
            "unknown strategy '{other}'. Valid: signal_change, buy_and_hold"
        )),
    }
}

impl InputArgs {
    /// Start from the config file (or defaults), apply flag overrides, then
    /// validate the merged result once.
    fn into_config(self) -> Result<BacktestConfig> {
        let mut config = match &self.config {
            Some(path) => BacktestConfig::read(path)?,
            None => BacktestConfig::default(),
        };

        if let Some(path) = self.data {
            config.data.path = Some(path);
            config.data.synthetic_bars = None;
        }
        if let Some(bars) = self.synthetic {
            config.data.synthetic_bars = Some(bars);
            config.data.path = None;
        }
        if let Some(seed) = self.seed {
            config.data.seed = seed;
        }
        if let Some(kind) = self.strategy {
            config.strategy.kind = kind;
        }
        if let Some(balance) = self.initial_balance {
            config.engine.initial_balance = balance;
        }
        if let Some(commission) = self.commission {
            config.engine.commission = commission;
        }
        if self.hedging {
            config.engine.position_mode = PositionMode::Hedging;
        }
        if self.no_force_close {
            config.engine.force_close_on_end = false;
        }
        if let Some(rate) = self.risk_free_rate {
            config.stats.risk_free_rate = rate;
        }

        if config.data.path.is_none() && config.data.synthetic_bars.is_none() {
            bail!("one of --config, --data or --synthetic is required");
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            output_dir,
            json,
        } => run_backtest_cmd(input, output_dir, json),
        Commands::Sweep {
            input,
            commissions,
            entry_values,
        } => run_sweep_cmd(input, commissions, entry_values),
    }
}

fn run_backtest_cmd(input: InputArgs, output_dir: PathBuf, json: bool) -> Result<()> {
    let config = input.into_config()?;
    let result = run_from_config(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.stats)?);
    } else {
        print_summary(&result);
    }

    let run_dir = save_artifacts(&result, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn run_sweep_cmd(input: InputArgs, commissions: Vec<f64>, entry_values: Vec<f64>) -> Result<()> {
    let config = input.into_config()?;
    let series = load_series(&config.data.source()?)?;
    let grid = SweepGrid {
        commissions,
        default_entry_values: entry_values,
    };
    info!(points = grid.size(), "running sweep");

    let rows = sweep(&series, &config, &grid)?;

    println!(
        "{:>12} {:>12} {:>8} {:>12} {:>10} {:>10}",
        "commission", "entry", "trades", "return [%]", "sharpe", "max dd [%]"
    );
    for row in &rows {
        println!(
            "{:>12} {:>12} {:>8} {:>12.2} {:>10.3} {:>10.2}",
            row.commission,
            row.default_entry_value,
            row.stats.total_trades,
            row.stats.equity_return_pct,
            row.stats.sharpe,
            row.stats.max_drawdown_pct,
        );
    }

    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:   {}", result.fingerprint.run_id.short());
    println!("Strategy: {}", result.fingerprint.strategy);
    println!();
    for (name, value) in result.stats.entries() {
        println!("{name:<28}{value}");
    }
    if !result.open_trades.is_empty() {
        println!();
        println!("{} trade(s) still open", result.open_trades.len());
    }
    println!();
}
