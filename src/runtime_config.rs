// =============================================================================
// Runtime Configuration — chart engine settings with atomic save
// =============================================================================
//
// Every tunable parameter of the detection engine and the chart composer
// lives here.  All fields carry serde defaults so that an empty `{}` or an
// older file missing new fields still loads.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::detectors::DEFAULT_MAX_PATTERNS;

/// Largest `limit` Binance accepts on `/api/v3/klines`.
pub const MAX_CANDLE_LIMIT: u32 = 1000;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_interval() -> String {
    "15m".to_string()
}

fn default_candle_limit() -> u32 {
    150
}

fn default_max_patterns_per_type() -> usize {
    DEFAULT_MAX_PATTERNS
}

fn default_order_block_window_half_width() -> f64 {
    3.0
}

fn default_imbalance_window_half_width() -> f64 {
    1.5
}

fn default_candle_half_width() -> f64 {
    0.25
}

fn default_chart_width() -> u32 {
    1400
}

fn default_chart_height() -> u32 {
    600
}

fn default_engine_label() -> String {
    "SMC v2.7 Clean".to_string()
}

fn default_bos_arrow_length_px() -> f64 {
    36.0
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the chart engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Request defaults ---------------------------------------------------

    /// Instrument used when a request does not name one.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Bar period used when a request does not name one (e.g. "15m").
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Number of candles fetched per request.
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,

    // --- Detection ----------------------------------------------------------

    /// Result cap shared by the order-block, imbalance and BoS detectors.
    #[serde(default = "default_max_patterns_per_type")]
    pub max_patterns_per_type: usize,

    // --- Chart geometry (index units) ---------------------------------------

    #[serde(default = "default_order_block_window_half_width")]
    pub order_block_window_half_width: f64,

    #[serde(default = "default_imbalance_window_half_width")]
    pub imbalance_window_half_width: f64,

    #[serde(default = "default_candle_half_width")]
    pub candle_half_width: f64,

    // --- Image --------------------------------------------------------------

    #[serde(default = "default_chart_width")]
    pub chart_width: u32,

    #[serde(default = "default_chart_height")]
    pub chart_height: u32,

    /// Third segment of the chart title.
    #[serde(default = "default_engine_label")]
    pub engine_label: String,

    #[serde(default = "default_bos_arrow_length_px")]
    pub bos_arrow_length_px: f64,

    /// When set, every produced chart is also written to this directory.
    #[serde(default)]
    pub chart_archive_dir: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            interval: default_interval(),
            candle_limit: default_candle_limit(),
            max_patterns_per_type: default_max_patterns_per_type(),
            order_block_window_half_width: default_order_block_window_half_width(),
            imbalance_window_half_width: default_imbalance_window_half_width(),
            candle_half_width: default_candle_half_width(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
            engine_label: default_engine_label(),
            bos_arrow_length_px: default_bos_arrow_length_px(),
            chart_archive_dir: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            interval = %config.interval,
            candle_limit = config.candle_limit,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Candle count to request from the exchange, clamped to `1..=1000`.
    pub fn effective_candle_limit(&self) -> u32 {
        self.candle_limit.clamp(1, MAX_CANDLE_LIMIT)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.interval, "15m");
        assert_eq!(cfg.candle_limit, 150);
        assert_eq!(cfg.max_patterns_per_type, 2);
        assert!((cfg.order_block_window_half_width - 3.0).abs() < f64::EPSILON);
        assert!((cfg.imbalance_window_half_width - 1.5).abs() < f64::EPSILON);
        assert_eq!((cfg.chart_width, cfg.chart_height), (1400, 600));
        assert!(cfg.chart_archive_dir.is_none());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "interval": "1h", "max_patterns_per_type": 3 }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.interval, "1h");
        assert_eq!(cfg.max_patterns_per_type, 3);
        assert_eq!(cfg.candle_limit, 150);
        assert_eq!(cfg.engine_label, "SMC v2.7 Clean");
    }

    #[test]
    fn candle_limit_is_clamped() {
        let mut cfg = RuntimeConfig::default();
        cfg.candle_limit = 5000;
        assert_eq!(cfg.effective_candle_limit(), 1000);
        cfg.candle_limit = 0;
        assert_eq!(cfg.effective_candle_limit(), 1);
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!(
            "smc-config-{}.json",
            uuid::Uuid::new_v4().simple()
        ));
        let mut cfg = RuntimeConfig::default();
        cfg.symbol = "ETHUSDT".into();
        cfg.chart_archive_dir = Some("/tmp/charts".into());
        cfg.save(&path).unwrap();
        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
        std::fs::remove_file(&path).unwrap();
    }
}
