use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SignalError;

// ---------------------------------------------------------------------------
// Raw rows (as delivered by the exchange collaborator)
// ---------------------------------------------------------------------------

/// A price field as it arrives on the wire. Binance sends prices as JSON
/// strings; other sources send plain numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(f64),
    Text(String),
}

impl RawPrice {
    /// Convert an arbitrary JSON value into a raw price. Anything that is not
    /// a string or number is kept as text so normalization rejects the row.
    pub fn from_json(val: &serde_json::Value) -> Self {
        match val {
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map_or_else(|| Self::Text(n.to_string()), Self::Number),
            other => Self::Text(other.to_string()),
        }
    }

    fn parse(&self, name: &str) -> Result<f64, String> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("{name} is not numeric: '{s}'")),
        }
    }
}

impl From<f64> for RawPrice {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// One unvalidated OHLC row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawKline {
    /// Open time in milliseconds since the UNIX epoch.
    pub open_time: i64,
    pub open: RawPrice,
    pub high: RawPrice,
    pub low: RawPrice,
    pub close: RawPrice,
}

// ---------------------------------------------------------------------------
// Normalized candles
// ---------------------------------------------------------------------------

/// A validated OHLC candle at a fixed position in its series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub index: usize,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub timestamp: DateTime<Utc>,
}

impl Candle {
    /// Up (or flat) candle: close at or above open.
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    pub fn body_low(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn body_high(&self) -> f64 {
        self.open.max(self.close)
    }
}

/// Immutable, time-ordered candle series shared read-only by every detector
/// and by the chart composer.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Validate `rows` and build the series.
    ///
    /// Only the most recent `limit` rows are considered. Rows that break the
    /// OHLC ordering invariant, carry non-positive or unparseable prices, or
    /// go back in time are dropped with a warning. Fails with
    /// [`SignalError::NoData`] when nothing survives.
    pub fn normalize(
        rows: &[RawKline],
        limit: usize,
        symbol: &str,
        interval: &str,
    ) -> Result<Self, SignalError> {
        let start = rows.len().saturating_sub(limit);
        let mut candles: Vec<Candle> = Vec::with_capacity(rows.len() - start);
        let mut rejected = 0usize;

        for (row, raw) in rows.iter().enumerate().skip(start) {
            let prev_ts = candles.last().map(|c| c.timestamp);
            match validate_row(row, raw, prev_ts) {
                Ok((timestamp, open, high, low, close)) => candles.push(Candle {
                    index: candles.len(),
                    open,
                    high,
                    low,
                    close,
                    timestamp,
                }),
                Err(e) => {
                    rejected += 1;
                    warn!(symbol, interval, error = %e, "dropping malformed candle");
                }
            }
        }

        if candles.is_empty() {
            return Err(SignalError::NoData {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            });
        }

        debug!(
            symbol,
            interval,
            accepted = candles.len(),
            rejected,
            "candle series normalized"
        );

        Ok(Self { candles })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Build a series straight from `(open, high, low, close)` tuples, one
    /// minute apart. Test helper; the tuples must already be valid.
    #[cfg(test)]
    pub fn from_ohlc(rows: &[(f64, f64, f64, f64)]) -> Self {
        let candles = rows
            .iter()
            .enumerate()
            .map(|(index, &(open, high, low, close))| Candle {
                index,
                open,
                high,
                low,
                close,
                timestamp: Utc
                    .timestamp_millis_opt(1_700_000_000_000 + index as i64 * 60_000)
                    .unwrap(),
            })
            .collect();
        Self { candles }
    }
}

type ValidRow = (DateTime<Utc>, f64, f64, f64, f64);

fn validate_row(
    row: usize,
    raw: &RawKline,
    prev_ts: Option<DateTime<Utc>>,
) -> Result<ValidRow, SignalError> {
    let malformed = |reason: String| SignalError::MalformedCandle { row, reason };

    let open = raw.open.parse("open").map_err(malformed)?;
    let high = raw.high.parse("high").map_err(malformed)?;
    let low = raw.low.parse("low").map_err(malformed)?;
    let close = raw.close.parse("close").map_err(malformed)?;

    if [open, high, low, close]
        .iter()
        .any(|p| !p.is_finite() || *p <= 0.0)
    {
        return Err(malformed(format!(
            "prices must be positive and finite (o={open}, h={high}, l={low}, c={close})"
        )));
    }
    if high < low {
        return Err(malformed(format!("high {high} below low {low}")));
    }
    if low > open.min(close) || high < open.max(close) {
        return Err(malformed(format!(
            "body [{}, {}] outside wick [{low}, {high}]",
            open.min(close),
            open.max(close)
        )));
    }

    let timestamp = Utc
        .timestamp_millis_opt(raw.open_time)
        .single()
        .ok_or_else(|| malformed(format!("invalid open time {}", raw.open_time)))?;

    if let Some(prev) = prev_ts {
        if timestamp < prev {
            return Err(malformed(format!(
                "open time {timestamp} earlier than previous {prev}"
            )));
        }
    }

    Ok((timestamp, open, high, low, close))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
