//! barlab core — domain types, simulation clock, account, orchestrator, history.
//!
//! This crate contains the heart of the backtesting engine:
//! - Domain types (bars, validated series, trades)
//! - Simulation clock with a bounded lookback window
//! - Account with netting/hedging position modes and per-bar bookkeeping
//! - Bar-by-bar orchestrator exposed as a cursor and as a strategy callback
//! - History table assembly (balance, equity, commission, positions, buy & hold)
//! - Run fingerprinting

pub mod domain;
pub mod engine;
pub mod fingerprint;
