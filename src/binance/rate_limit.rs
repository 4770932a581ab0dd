// =============================================================================
// Rate-Limit Tracker — monitors Binance request weight to avoid 429s
// =============================================================================
//
// Binance allows 1200 request weight per minute per IP; we hard-cap ourselves
// at 1000.  The tracker reads the `X-MBX-USED-WEIGHT-1M` response header after
// every kline request.  A reading older than one minute is stale: the window
// it described has rolled over, so it counts as zero.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use tracing::{debug, warn};

/// Hard ceiling at which we refuse to send additional requests.
const WEIGHT_HARD_LIMIT: u32 = 1000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 800;
/// Length of the Binance weight window.
const WINDOW_MS: i64 = 60_000;

/// Request weight of `GET /api/v3/klines` for a given `limit`.
pub fn kline_request_weight(limit: u32) -> u32 {
    match limit {
        0..=99 => 1,
        100..=499 => 2,
        500..=1000 => 5,
        _ => 10,
    }
}

/// Thread-safe weight tracker backed by atomics.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    updated_at_ms: AtomicI64,
}

/// Immutable snapshot of the current rate-limit state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
    pub hard_limit: u32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            updated_at_ms: AtomicI64::new(0),
        }
    }

    /// Update the counter from the HTTP response headers returned by Binance.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let weight = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok());

        if let Some(w) = weight {
            self.record(w, chrono::Utc::now().timestamp_millis());
        }
    }

    fn record(&self, weight: u32, now_ms: i64) {
        let prev = self.used_weight_1m.swap(weight, Ordering::Relaxed);
        self.updated_at_ms.store(now_ms, Ordering::Relaxed);
        if weight >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "rate-limit weight updated from header");
    }

    fn current_weight(&self, now_ms: i64) -> u32 {
        let at = self.updated_at_ms.load(Ordering::Relaxed);
        if now_ms - at >= WINDOW_MS {
            0
        } else {
            self.used_weight_1m.load(Ordering::Relaxed)
        }
    }

    /// Return `true` if we can afford to spend `weight` more request weight
    /// without exceeding the hard limit.
    pub fn can_send_request(&self, weight: u32) -> bool {
        self.can_send_at(weight, chrono::Utc::now().timestamp_millis())
    }

    fn can_send_at(&self, weight: u32, now_ms: i64) -> bool {
        let current = self.current_weight(now_ms);
        let allowed = current.saturating_add(weight) <= WEIGHT_HARD_LIMIT;
        if !allowed {
            warn!(
                current_weight = current,
                requested_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request blocked — would exceed rate-limit"
            );
        }
        allowed
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.current_weight(chrono::Utc::now().timestamp_millis()),
            hard_limit: WEIGHT_HARD_LIMIT,
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight_1m.load(Ordering::Relaxed))
            .field("updated_at_ms", &self.updated_at_ms.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn kline_weights_follow_limit_buckets() {
        assert_eq!(kline_request_weight(50), 1);
        assert_eq!(kline_request_weight(150), 2);
        assert_eq!(kline_request_weight(1000), 5);
        assert_eq!(kline_request_weight(1500), 10);
    }

    #[test]
    fn header_updates_weight() {
        let tracker = RateLimitTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", HeaderValue::from_static("999"));
        tracker.update_from_headers(&headers);
        assert_eq!(tracker.snapshot().used_weight_1m, 999);
        assert!(tracker.can_send_request(1));
        assert!(!tracker.can_send_request(2));
    }

    #[test]
    fn stale_reading_counts_as_zero() {
        let tracker = RateLimitTracker::new();
        tracker.record(1000, 0);
        assert!(!tracker.can_send_at(1, 30_000));
        assert!(tracker.can_send_at(1, 60_000));
    }

    #[test]
    fn huge_header_weight_blocks_without_overflow() {
        let tracker = RateLimitTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", HeaderValue::from_static("4294967295"));
        tracker.update_from_headers(&headers);
        assert_eq!(tracker.snapshot().used_weight_1m, u32::MAX);
        assert!(!tracker.can_send_request(2));
    }

    #[test]
    fn garbage_header_is_ignored() {
        let tracker = RateLimitTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", HeaderValue::from_static("lots"));
        tracker.update_from_headers(&headers);
        assert_eq!(tracker.snapshot().used_weight_1m, 0);
    }
}
