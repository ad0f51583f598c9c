//! Run fingerprinting — deterministic identification of a backtest run.
//!
//! - `DatasetHash`: content hash of the series (every bar, every field).
//! - `ConfigHash`: engine configuration + strategy name.
//! - `RunId`: combination of both; equal inputs give equal ids.

use crate::domain::{ConfigHash, DatasetHash, RunId, Series};
use crate::engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// Identity of a single run, persisted alongside its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub run_id: RunId,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    pub strategy: String,
    pub bar_count: usize,
}

impl RunFingerprint {
    pub fn new(series: &Series, config: &EngineConfig, strategy: &str) -> Self {
        let dataset_hash = dataset_hash(series);
        let config_hash = config_hash(config, strategy);
        Self {
            run_id: RunId::new(&config_hash, &dataset_hash),
            config_hash,
            dataset_hash,
            strategy: strategy.to_string(),
            bar_count: series.len(),
        }
    }
}

/// BLAKE3 over the canonical JSON of every bar.
pub fn dataset_hash(series: &Series) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for bar in series.bars() {
        // Bar serialization is infallible: plain numbers, options and a timestamp.
        if let Ok(json) = serde_json::to_vec(bar) {
            hasher.update(&json);
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

/// BLAKE3 over the engine config and strategy name.
pub fn config_hash(config: &EngineConfig, strategy: &str) -> ConfigHash {
    let canonical = serde_json::json!({
        "engine": config,
        "strategy": strategy,
    });
    ConfigHash::from_bytes(canonical.to_string().as_bytes())
}
