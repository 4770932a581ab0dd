// =============================================================================
// Imbalance (Fair Value Gap) Detector
// =============================================================================
//
// A three-candle gap: the wick of candle i does not reach the wick of candle
// i-2.
//
//   bullish:  low[i]  > high[i-2]  -> [high[i-2], low[i]]
//   bearish:  high[i] < low[i-2]   -> [high[i],   low[i-2]]
//
// Unlike the other two detectors the result is ranked by gap width, widest
// first.  Equal widths keep scan order.

use serde::{Deserialize, Serialize};

use crate::error::SignalError;
use crate::market_data::CandleSeries;

/// Minimum series length for the imbalance scan.
pub const MIN_CANDLES: usize = 3;

/// An untraded price range between two non-adjacent wicks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Imbalance {
    pub anchor_index: usize,
    pub price_low: f64,
    pub price_high: f64,
}

impl Imbalance {
    pub fn width(&self) -> f64 {
        self.price_high - self.price_low
    }
}

/// Scan `series` and return the `max` widest imbalances.
pub fn detect_imbalances(series: &CandleSeries, max: usize) -> Vec<Imbalance> {
    detect_imbalances_checked(series, max).unwrap_or_default()
}

/// Same as [`detect_imbalances`] but reports why nothing could be scanned.
pub fn detect_imbalances_checked(
    series: &CandleSeries,
    max: usize,
) -> Result<Vec<Imbalance>, SignalError> {
    let c = series.candles();
    if c.len() < MIN_CANDLES {
        return Err(SignalError::InsufficientData {
            detector: "imbalance",
            required: MIN_CANDLES,
            actual: c.len(),
        });
    }

    let mut gaps = Vec::new();
    for i in 2..c.len() {
        let cur = &c[i];
        let back = &c[i - 2];

        if cur.low > back.high {
            gaps.push(Imbalance {
                anchor_index: cur.index,
                price_low: back.high,
                price_high: cur.low,
            });
        } else if cur.high < back.low {
            gaps.push(Imbalance {
                anchor_index: cur.index,
                price_low: cur.high,
                price_high: back.low,
            });
        }
    }

    // sort_by is stable, so ties stay in scan order.
    gaps.sort_by(|a, b| b.width().total_cmp(&a.width()));
    gaps.truncate(max);
    Ok(gaps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_series_is_empty() {
        let series = CandleSeries::from_ohlc(&[(10.0, 12.0, 9.0, 11.0), (30.0, 32.0, 29.0, 31.0)]);
        assert!(detect_imbalances(&series, 2).is_empty());
        assert!(detect_imbalances_checked(&series, 2).is_err());
    }

    #[test]
    fn overlapping_ascending_candles_have_no_gap() {
        let series = CandleSeries::from_ohlc(&[
            (100.0, 102.0, 99.0, 101.0),
            (101.0, 103.0, 100.0, 102.0),
            (102.0, 104.0, 101.0, 103.0),
            (103.0, 105.0, 102.0, 104.0),
            (104.0, 106.0, 103.0, 105.0),
        ]);
        assert!(detect_imbalances(&series, 2).is_empty());
    }

    #[test]
    fn bullish_and_bearish_gap_bounds() {
        let series = CandleSeries::from_ohlc(&[
            (10.0, 11.0, 9.0, 10.5),
            (10.5, 14.0, 10.0, 13.5),
            (13.5, 16.0, 13.0, 15.5), // low 13 > high[0] 11
            (15.5, 15.6, 8.0, 8.5),
            (8.5, 9.0, 7.0, 7.5), // high 9 < low[2] 13
        ]);
        let gaps = detect_imbalances(&series, 5);
        assert_eq!(gaps.len(), 2);
        assert_eq!(
            gaps[0],
            Imbalance { anchor_index: 4, price_low: 9.0, price_high: 13.0 }
        );
        assert_eq!(
            gaps[1],
            Imbalance { anchor_index: 2, price_low: 11.0, price_high: 13.0 }
        );
    }

    #[test]
    fn widest_gap_wins_over_recency() {
        // Gap at 2 has width 20, gap at 5 has width 5 (low 50 above high[3] 45).
        let series = CandleSeries::from_ohlc(&[
            (20.0, 30.0, 10.0, 25.0),
            (25.0, 48.0, 24.0, 47.0),
            (55.0, 60.0, 50.0, 58.0),
            (44.0, 45.0, 40.0, 41.0),
            (41.0, 60.0, 41.0, 59.0),
            (55.0, 56.0, 50.0, 52.0),
        ]);
        let gaps = detect_imbalances(&series, 2);
        assert!((gaps[0].width() - 20.0).abs() < 1e-9);
        assert_eq!(gaps[0].anchor_index, 2);
        assert_eq!(gaps[1].anchor_index, 5);
        assert!((gaps[1].width() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn equal_widths_keep_scan_order_and_selected_dominate_rest() {
        // Rising staircase of bullish gaps; the two widest tie at 3.
        let series = CandleSeries::from_ohlc(&[
            (10.0, 11.0, 9.0, 10.5),
            (10.5, 12.0, 10.0, 11.5),
            (12.5, 13.0, 12.0, 12.8),
            (12.8, 15.0, 12.5, 14.5),
            (16.5, 17.0, 16.0, 16.8), // gap [13, 16]
            (16.8, 19.0, 16.5, 18.5),
            (20.5, 21.0, 20.0, 20.8), // gap [17, 20]
        ]);
        let all = detect_imbalances(&series, usize::MAX);
        let top = detect_imbalances(&series, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].anchor_index, 4);
        assert_eq!(top[1].anchor_index, 6);
        for m in all.iter().filter(|m| !top.contains(m)) {
            assert!(top.iter().all(|s| s.width() >= m.width()));
        }
    }
}
