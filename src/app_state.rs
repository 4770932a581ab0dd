// =============================================================================
// Central Application State
// =============================================================================
//
// Shared by the Telegram loop and the HTTP API through `Arc<AppState>`.  It
// owns the market-data client, the live runtime configuration and a small
// amount of bookkeeping for the health endpoint.  No chart data is kept here:
// every request builds and drops its own series and artifact.
//
// Thread safety:
//   - Atomic counters for request statistics.
//   - parking_lot::RwLock for the config and the error ring buffer.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::binance::rate_limit::RateLimitSnapshot;
use crate::binance::{BinanceClient, KlineSource};
use crate::chart::ChartArtifact;
use crate::error::SignalError;
use crate::pipeline::{self, ChartRequest};
use crate::runtime_config::RuntimeConfig;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded failure for the health endpoint's error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Error kind, e.g. `NoData` or `CollaboratorFailure`.
    pub kind: String,
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// AppState
// =============================================================================

pub struct AppState {
    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Market Data ─────────────────────────────────────────────────────
    pub binance: BinanceClient,

    // ── Statistics ──────────────────────────────────────────────────────
    pub requests_served: AtomicU64,
    pub requests_failed: AtomicU64,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, binance: BinanceClient) -> Self {
        Self {
            runtime_config: Arc::new(RwLock::new(config)),
            binance,
            requests_served: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    /// Fetch, analyse and render a chart from Binance data.
    pub async fn generate_chart(&self, request: ChartRequest) -> Result<ChartArtifact, SignalError> {
        self.generate_chart_from(&self.binance, request).await
    }

    /// Same as [`generate_chart`](Self::generate_chart) with an explicit source.
    ///
    /// The config is cloned up front so a concurrent config change never
    /// affects a request already in flight.
    pub async fn generate_chart_from<S: KlineSource>(
        &self,
        source: &S,
        request: ChartRequest,
    ) -> Result<ChartArtifact, SignalError> {
        let cfg = self.runtime_config.read().clone();
        let result = pipeline::handle_request(source, request.clone(), cfg).await;

        match &result {
            Ok(_) => {
                self.requests_served.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.requests_failed.fetch_add(1, Ordering::Relaxed);
                self.record_error(
                    e.kind(),
                    format!("{} {}: {}", request.symbol, request.interval, e),
                );
            }
        }
        result
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error. The ring buffer is capped at [`MAX_RECENT_ERRORS`];
    /// oldest entries are evicted when the limit is reached.
    pub fn record_error(&self, kind: &str, message: String) {
        let record = ErrorRecord {
            kind: kind.to_string(),
            message,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Serialisable health summary for `GET /api/v1/health`.
    pub fn health_snapshot(&self) -> HealthSnapshot {
        let config = self.runtime_config.read();
        HealthSnapshot {
            status: "ok",
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests_served: self.requests_served.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            default_symbol: config.symbol.clone(),
            default_interval: config.interval.clone(),
            candle_limit: config.effective_candle_limit(),
            rate_limit: self.binance.rate_limit().snapshot(),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub requests_served: u64,
    pub requests_failed: u64,
    pub default_symbol: String,
    pub default_interval: String,
    pub candle_limit: u32,
    pub rate_limit: RateLimitSnapshot,
    pub recent_errors: Vec<ErrorRecord>,
}
