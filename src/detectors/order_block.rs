// =============================================================================
// Order-Block Detector
// =============================================================================
//
// An order block is the last opposing candle before a displacement.  For each
// candle i >= 3 the predecessor p = i-1 is tested against its own predecessor
// pp = i-2:
//
//   bearish:  close[p] < open[p]  AND  high[p] > high[pp]  -> [open[p], high[p]]
//   bullish:  close[p] > open[p]  AND  low[p]  < low[pp]   -> [low[p],  open[p]]
//
// Only the most recent matches survive (trailing window, not a ranking).

use serde::{Deserialize, Serialize};

use super::keep_trailing;
use crate::error::SignalError;
use crate::market_data::CandleSeries;
use crate::types::ZoneDirection;

/// Minimum series length for the order-block scan.
pub const MIN_CANDLES: usize = 4;

/// A candle range flagged as a potential reaction zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub anchor_index: usize,
    pub price_low: f64,
    pub price_high: f64,
    pub direction: ZoneDirection,
}

/// Scan `series` and return at most `max` order blocks, oldest first.
///
/// Series shorter than [`MIN_CANDLES`] yield an empty list.
pub fn detect_order_blocks(series: &CandleSeries, max: usize) -> Vec<OrderBlock> {
    detect_order_blocks_checked(series, max).unwrap_or_default()
}

/// Same as [`detect_order_blocks`] but reports why nothing could be scanned.
pub fn detect_order_blocks_checked(
    series: &CandleSeries,
    max: usize,
) -> Result<Vec<OrderBlock>, SignalError> {
    let c = series.candles();
    if c.len() < MIN_CANDLES {
        return Err(SignalError::InsufficientData {
            detector: "order_block",
            required: MIN_CANDLES,
            actual: c.len(),
        });
    }

    let mut zones = Vec::new();
    for i in 3..c.len() {
        let p = &c[i - 1];
        let pp = &c[i - 2];

        if p.close < p.open && p.high > pp.high {
            zones.push(OrderBlock {
                anchor_index: p.index,
                price_low: p.open,
                price_high: p.high,
                direction: ZoneDirection::Bearish,
            });
        } else if p.close > p.open && p.low < pp.low {
            zones.push(OrderBlock {
                anchor_index: p.index,
                price_low: p.low,
                price_high: p.open,
                direction: ZoneDirection::Bullish,
            });
        }
    }

    Ok(keep_trailing(zones, max))
}
