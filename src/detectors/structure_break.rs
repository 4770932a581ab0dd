// =============================================================================
// Break-of-Structure Detector
// =============================================================================
//
// A candle breaks structure when its extreme exceeds the same extreme two
// candles back.  Both conditions are checked independently, so one candle can
// produce a down break and an up break (in that order).  The last `max`
// entries of the scan survive.

use serde::{Deserialize, Serialize};

use super::keep_trailing;
use crate::error::SignalError;
use crate::market_data::CandleSeries;
use crate::types::BreakDirection;

/// Minimum series length for the break-of-structure scan.
pub const MIN_CANDLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureBreak {
    pub direction: BreakDirection,
    pub anchor_index: usize,
    /// The low (down break) or high (up break) of the breaking candle.
    pub level: f64,
}

/// Scan `series` and return the last `max` structure breaks in scan order.
pub fn detect_structure_breaks(series: &CandleSeries, max: usize) -> Vec<StructureBreak> {
    detect_structure_breaks_checked(series, max).unwrap_or_default()
}

/// Same as [`detect_structure_breaks`] but reports why nothing could be scanned.
pub fn detect_structure_breaks_checked(
    series: &CandleSeries,
    max: usize,
) -> Result<Vec<StructureBreak>, SignalError> {
    let c = series.candles();
    if c.len() < MIN_CANDLES {
        return Err(SignalError::InsufficientData {
            detector: "structure_break",
            required: MIN_CANDLES,
            actual: c.len(),
        });
    }

    let mut breaks = Vec::new();
    for i in 2..c.len() {
        let cur = &c[i];
        let back = &c[i - 2];

        if cur.low < back.low {
            breaks.push(StructureBreak {
                direction: BreakDirection::Down,
                anchor_index: cur.index,
                level: cur.low,
            });
        }
        if cur.high > back.high {
            breaks.push(StructureBreak {
                direction: BreakDirection::Up,
                anchor_index: cur.index,
                level: cur.high,
            });
        }
    }

    Ok(keep_trailing(breaks, max))
}
