// =============================================================================
// SMC Chart Bot — Main Entry Point
// =============================================================================
//
// Serves Smart Money Concepts charts (order blocks, fair value gaps, breaks of
// structure) over Telegram and, optionally, a small HTTP API.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod chart;
mod detectors;
mod error;
mod market_data;
mod pipeline;
mod runtime_config;
mod telegram;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::runtime_config::RuntimeConfig;
use crate::telegram::TelegramClient;

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("SMC Chart Bot starting up");

    let config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    info!(
        symbol = %config.symbol,
        interval = %config.interval,
        candle_limit = config.effective_candle_limit(),
        max_patterns = config.max_patterns_per_type,
        "Runtime config loaded"
    );

    // ── 2. Market data client & shared state ─────────────────────────────
    let api_key = std::env::var("BINANCE_API_KEY").ok();
    let binance = BinanceClient::new(api_key.as_deref())?;
    let state = Arc::new(AppState::new(config, binance));

    // ── 3. HTTP API (optional) ───────────────────────────────────────────
    if let Ok(bind_addr) = std::env::var("SMC_BIND_ADDR") {
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
        info!(addr = %bind_addr, "API server listening");

        let app = api::rest::router(state.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "API server failed");
            }
        });
    } else {
        info!("SMC_BIND_ADDR not set — HTTP API disabled");
    }

    // ── 4. Telegram bot ──────────────────────────────────────────────────
    match std::env::var("TELEGRAM_TOKEN") {
        Ok(token) => {
            let telegram = TelegramClient::new(&token)?;
            tokio::spawn(telegram::run_bot(state.clone(), telegram));
        }
        Err(_) => warn!("TELEGRAM_TOKEN not set — Telegram bot disabled"),
    }

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("SMC Chart Bot shut down complete.");
    Ok(())
}
