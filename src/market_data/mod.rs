pub mod candle_series;

// Re-export for convenient access (e.g. `use crate::market_data::CandleSeries`).
pub use candle_series::{CandleSeries, RawKline, RawPrice};
