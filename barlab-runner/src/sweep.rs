//! Parameter sweeps over commission and default entry sizing.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use barlab_core::domain::Series;

use crate::config::BacktestConfig;
use crate::metrics::Stats;
use crate::runner::{run_backtest, RunError};

/// Values to sweep. Every commission is paired with every entry value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub commissions: Vec<f64>,
    /// `<= 1` is a fraction of balance, `> 1` a fixed cash amount.
    pub default_entry_values: Vec<f64>,
}

impl SweepGrid {
    /// Returns the total number of configurations in this grid.
    pub fn size(&self) -> usize {
        self.commissions.len() * self.default_entry_values.len()
    }

    /// All `(commission, default_entry_value)` pairs, commission-major.
    pub fn combinations(&self) -> Vec<(f64, f64)> {
        self.commissions
            .iter()
            .flat_map(|&c| self.default_entry_values.iter().map(move |&v| (c, v)))
            .collect()
    }
}

/// One sweep point and its statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRow {
    pub commission: f64,
    pub default_entry_value: f64,
    pub stats: Stats,
}

/// Run the configured strategy over `series` once per grid point.
///
/// Runs execute in parallel. Rows come back in [`SweepGrid::combinations`]
/// order. Every configuration is validated before any run starts.
pub fn sweep(
    series: &Series,
    base: &BacktestConfig,
    grid: &SweepGrid,
) -> Result<Vec<SweepRow>, RunError> {
    let configs = grid
        .combinations()
        .into_iter()
        .map(|(commission, default_entry_value)| {
            let mut engine = base.engine.clone();
            engine.commission = commission;
            engine.default_entry_value = default_entry_value;
            engine.validate()?;
            Ok(engine)
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    info!(points = configs.len(), bars = series.len(), "starting sweep");

    let kind = base.strategy.kind;
    let risk_free_rate = base.stats.risk_free_rate;
    configs
        .par_iter()
        .map(|engine| {
            let mut strategy = kind.build();
            let result = run_backtest(series, engine, strategy.as_mut(), risk_free_rate)?;
            Ok(SweepRow {
                commission: engine.commission,
                default_entry_value: engine.default_entry_value,
                stats: result.stats,
            })
        })
        .collect()
}
