// =============================================================================
// Market-structure detectors
// =============================================================================
//
// Three independent, pure scans over the same immutable candle series:
//
//   order_block      — last swing candle before a displacement (trailing cap)
//   imbalance        — three-candle wick gaps (widest-gap cap)
//   structure_break  — extreme beyond the extreme two candles back (trailing cap)
//
// None of them share state, so `detect_all` forks one scoped thread per
// detector and joins before returning.

pub mod imbalance;
pub mod order_block;
pub mod structure_break;

use serde::Serialize;
use tracing::debug;

use crate::market_data::CandleSeries;

pub use imbalance::{detect_imbalances, Imbalance};
pub use order_block::{detect_order_blocks, OrderBlock};
pub use structure_break::{detect_structure_breaks, StructureBreak};

/// Default cap applied to every detector's result list.
pub const DEFAULT_MAX_PATTERNS: usize = 2;

/// Keep only the last `max` entries of a scan-ordered list.
pub(crate) fn keep_trailing<T>(mut matches: Vec<T>, max: usize) -> Vec<T> {
    let excess = matches.len().saturating_sub(max);
    matches.drain(..excess);
    matches
}

/// Output of one detection run, one list per detector.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternSet {
    pub order_blocks: Vec<OrderBlock>,
    pub imbalances: Vec<Imbalance>,
    pub structure_breaks: Vec<StructureBreak>,
}

impl PatternSet {
    /// Total number of detected patterns across all three lists.
    pub fn total(&self) -> usize {
        self.order_blocks.len() + self.imbalances.len() + self.structure_breaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Run all three detectors concurrently over `series`.
pub fn detect_all(series: &CandleSeries, max_per_type: usize) -> PatternSet {
    let patterns = std::thread::scope(|s| {
        let ob = s.spawn(|| detect_order_blocks(series, max_per_type));
        let fvg = s.spawn(|| detect_imbalances(series, max_per_type));
        let bos = s.spawn(|| detect_structure_breaks(series, max_per_type));

        // The scans cannot panic on a valid series; a panic here is a bug and
        // is re-raised on the caller's thread.
        PatternSet {
            order_blocks: join(ob),
            imbalances: join(fvg),
            structure_breaks: join(bos),
        }
    });

    debug!(
        candles = series.len(),
        order_blocks = patterns.order_blocks.len(),
        imbalances = patterns.imbalances.len(),
        structure_breaks = patterns.structure_breaks.len(),
        total = patterns.total(),
        "detection complete"
    );

    patterns
}

fn join<T>(handle: std::thread::ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(v) => v,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}
