//! Domain types for barlab

pub mod bar;
pub mod ids;
pub mod trade;

pub use bar::{Bar, Series, SeriesError};
pub use ids::{ConfigHash, DatasetHash, RunId, TradeId, TradeIdGen};
pub use trade::{Direction, Trade, TradeExit, TradeRecord};
