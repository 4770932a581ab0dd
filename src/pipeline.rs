// =============================================================================
// Request pipeline — fetch -> normalize -> detect -> compose
// =============================================================================
//
// The only blocking/suspending step is the kline fetch, which happens before
// the core runs.  Normalization, detection and composition are CPU-bound and
// run together on the blocking pool.  Every request owns its own series and
// artifact; nothing is shared between requests.
// =============================================================================

use tracing::{debug, info, warn};

use crate::binance::KlineSource;
use crate::chart::{compose, ChartArtifact, ChartOptions};
use crate::detectors::detect_all;
use crate::error::SignalError;
use crate::market_data::{CandleSeries, RawKline};
use crate::runtime_config::RuntimeConfig;

/// One chart request: which instrument and which bar period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub symbol: String,
    pub interval: String,
}

impl ChartRequest {
    /// Symbols are case-insensitive on the exchange; normalize to upper case.
    pub fn new(symbol: &str, interval: &str) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            interval: interval.trim().to_string(),
        }
    }
}

/// Run the core over already-fetched rows.
pub fn run_pipeline(
    rows: &[RawKline],
    request: &ChartRequest,
    cfg: &RuntimeConfig,
) -> Result<ChartArtifact, SignalError> {
    let series = CandleSeries::normalize(
        rows,
        cfg.effective_candle_limit() as usize,
        &request.symbol,
        &request.interval,
    )?;
    let patterns = detect_all(&series, cfg.max_patterns_per_type);
    if patterns.is_empty() {
        debug!(symbol = %request.symbol, interval = %request.interval, "no patterns; chart shows candles only");
    }
    compose(
        &series,
        &patterns,
        &request.symbol,
        &request.interval,
        &ChartOptions::from_config(cfg),
    )
}

/// Fetch candles from `source` and produce the chart for `request`.
///
/// Fetch failures surface as [`SignalError::Collaborator`]; no retry is
/// attempted here.
pub async fn handle_request<S: KlineSource>(
    source: &S,
    request: ChartRequest,
    cfg: RuntimeConfig,
) -> Result<ChartArtifact, SignalError> {
    let rows = source
        .fetch_klines(&request.symbol, &request.interval, cfg.effective_candle_limit())
        .await
        .map_err(|e| SignalError::collaborator(&e))?;

    // Rendering and the optional archive write both block; keep them off
    // the async workers.
    let req = request.clone();
    let artifact = tokio::task::spawn_blocking(move || {
        let artifact = run_pipeline(&rows, &req, &cfg)?;
        if let Some(dir) = &cfg.chart_archive_dir {
            if let Err(e) = artifact.persist(dir) {
                warn!(error = %e, dir = %dir, "failed to archive chart");
            }
        }
        Ok::<_, SignalError>(artifact)
    })
    .await
    .map_err(|e| SignalError::RenderingFailure(format!("pipeline task failed: {e}")))??;

    info!(
        symbol = %request.symbol,
        interval = %request.interval,
        overlays = artifact.overlays,
        file = %artifact.file_name,
        "chart ready"
    );

    Ok(artifact)
}
