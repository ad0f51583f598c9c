//! Criterion benchmarks for the statistics engine.
//!
//! Benchmarks:
//! 1. Full `compute_stats` over a synthetic run, by series length
//! 2. Drawdown series + period extraction on its own

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use barlab_core::engine::{run_strategy, EngineConfig};
use barlab_runner::metrics::{compute_stats, drawdown_periods, drawdown_series};
use barlab_runner::{synthetic_series, SignalChange};

fn bench_compute_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_stats");

    for bars in [250, 2_500, 10_000] {
        let series = synthetic_series(bars, 42).unwrap();
        let output = run_strategy(&series, &EngineConfig::default(), &mut SignalChange).unwrap();
        let trades = output.trade_records();

        group.bench_with_input(BenchmarkId::from_parameter(bars), &bars, |b, _| {
            b.iter(|| compute_stats(black_box(&output.history), black_box(&trades), 0.0));
        });
    }

    group.finish();
}

fn bench_drawdown(c: &mut Criterion) {
    let series = synthetic_series(10_000, 7).unwrap();
    let output = run_strategy(&series, &EngineConfig::default(), &mut SignalChange).unwrap();
    let equity = output.history.equity();
    let timestamps = output.history.timestamps();

    c.bench_function("drawdown_10k", |b| {
        b.iter(|| {
            let dd = drawdown_series(black_box(&equity));
            drawdown_periods(&dd, black_box(&timestamps))
        });
    });
}

criterion_group!(benches, bench_compute_stats, bench_drawdown);
criterion_main!(benches);
