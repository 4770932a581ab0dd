// =============================================================================
// Binance REST API Client — public kline data
// =============================================================================
//
// Only the public `/api/v3/klines` endpoint is used, so no request signing is
// needed.  When an API key is configured it is sent as `X-MBX-APIKEY`, which
// Binance uses to attribute the request weight to the key.
// =============================================================================

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, instrument, warn};

use crate::binance::rate_limit::{kline_request_weight, RateLimitTracker};
use crate::market_data::{RawKline, RawPrice};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Anything that can supply raw OHLC rows for a symbol/interval.
pub trait KlineSource: Send + Sync {
    fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<RawKline>>> + Send;
}

/// Binance REST API client for market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `BinanceClient`.
    ///
    /// # Arguments
    /// * `api_key` — optional Binance API key (sent as a header, never logged).
    pub fn new(api_key: Option<&str>) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let val = HeaderValue::from_str(key).context("BINANCE_API_KEY is not a valid header value")?;
            default_headers.insert("X-MBX-APIKEY", val);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!("BinanceClient initialised (base_url={DEFAULT_BASE_URL})");

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.rate_limit
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines (public — no signature required).
    ///
    /// Array indices of each row:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume, ...
    ///
    /// Prices are returned unparsed; validation happens during normalization.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<RawKline>> {
        if !self.rate_limit.can_send_request(kline_request_weight(limit)) {
            anyhow::bail!("Binance request weight budget exhausted, try again in a minute");
        }

        let url = format!("{}/api/v3/klines", self.base_url);
        let limit_str = limit.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("interval", interval), ("limit", limit_str.as_str())])
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!(
                "Binance GET /api/v3/klines returned {}: {}",
                status,
                body
            );
        }

        let rows = parse_klines(&body)?;
        debug!(symbol, interval, count = rows.len(), "klines fetched");
        Ok(rows)
    }
}

impl KlineSource for BinanceClient {
    async fn fetch_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<RawKline>> {
        self.get_klines(symbol, interval, limit).await
    }
}

/// Parse Binance's array-of-arrays kline payload.
///
/// Rows with fewer than five elements or without an integer open time are
/// skipped with a warning.
pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<RawKline>> {
    let raw = body
        .as_array()
        .context("klines response is not an array")?;

    let mut rows = Vec::with_capacity(raw.len());

    for entry in raw {
        let arr = entry
            .as_array()
            .context("kline entry is not an array")?;

        if arr.len() < 5 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let Some(open_time) = arr[0].as_i64() else {
            warn!(value = %arr[0], "skipping kline entry without integer open time");
            continue;
        };

        rows.push(RawKline {
            open_time,
            open: RawPrice::from_json(&arr[1]),
            high: RawPrice::from_json(&arr[2]),
            low: RawPrice::from_json(&arr[3]),
            close: RawPrice::from_json(&arr[4]),
        });
    }

    Ok(rows)
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_binance_payload() {
        let body = serde_json::json!([
            [1700000000000i64, "37000.00", "37050.00", "36990.00", "37020.00", "123.4",
             1700000059999i64, "0", 10, "0", "0", "0"],
            [1700000060000i64, "37020.00", "37080.00", "37010.00", "37070.00", "99.1",
             1700000119999i64, "0", 12, "0", "0", "0"]
        ]);
        let rows = parse_klines(&body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].open_time, 1_700_000_000_000);
        assert_eq!(rows[1].close, RawPrice::Text("37070.00".into()));
    }

    #[test]
    fn short_rows_and_bad_times_are_skipped() {
        let body = serde_json::json!([
            [1700000000000i64, "1.0", "2.0"],
            ["not-a-time", "1.0", "2.0", "0.5", "1.5"],
            [1700000060000i64, 1.0, 2.0, 0.5, 1.5]
        ]);
        let rows = parse_klines(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].high, RawPrice::Number(2.0));
    }

    #[test]
    fn non_array_payload_is_error() {
        let body = serde_json::json!({ "code": -1121, "msg": "Invalid symbol." });
        assert!(parse_klines(&body).is_err());
    }

    #[test]
    fn debug_hides_headers() {
        let client = BinanceClient::new(Some("secret-key")).unwrap();
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains(DEFAULT_BASE_URL));
    }
}
