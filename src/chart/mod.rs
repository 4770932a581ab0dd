// =============================================================================
// Chart Composer — candles plus order blocks, imbalances and BoS markers
// =============================================================================
//
// compose() = ChartScene::build (world geometry) -> raster::paint (pixels)
//             -> PNG bytes wrapped in a ChartArtifact with a per-request
//             unique file name.
//
// Empty pattern lists are not an error; the matching layer is simply absent.
// An empty series or unusable geometry is a RenderingFailure.
// =============================================================================

pub mod coords;
pub mod raster;
pub mod scene;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::detectors::PatternSet;
use crate::error::SignalError;
use crate::market_data::CandleSeries;
use crate::runtime_config::RuntimeConfig;

pub use scene::{ChartScene, SceneGeometry};

/// Rendering parameters taken from the runtime config.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
    pub geometry: SceneGeometry,
    pub arrow_length_px: f64,
    pub engine_label: String,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl ChartOptions {
    pub fn from_config(cfg: &RuntimeConfig) -> Self {
        Self {
            width: cfg.chart_width,
            height: cfg.chart_height,
            geometry: SceneGeometry {
                candle_half_width: cfg.candle_half_width,
                order_block_half_width: cfg.order_block_window_half_width,
                imbalance_half_width: cfg.imbalance_window_half_width,
            },
            arrow_length_px: cfg.bos_arrow_length_px,
            engine_label: cfg.engine_label.clone(),
        }
    }
}

/// A rendered chart ready for delivery.
#[derive(Debug, Clone)]
pub struct ChartArtifact {
    /// Collision-free name, `<SYMBOL>_<INTERVAL>_<uuid>.png`.
    pub file_name: String,
    pub png: Vec<u8>,
    /// Number of pattern overlays drawn.
    pub overlays: usize,
}

impl ChartArtifact {
    /// Write the PNG into `dir` under its file name.
    pub fn persist(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create chart directory {}", dir.display()))?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.png)
            .with_context(|| format!("failed to write chart to {}", path.display()))?;
        info!(path = %path.display(), bytes = self.png.len(), "chart persisted");
        Ok(path)
    }
}

/// Title line: `"<SYMBOL> | <INTERVAL> | <engine label>"`.
pub fn chart_title(symbol: &str, interval: &str, engine_label: &str) -> String {
    format!("{symbol} | {interval} | {engine_label}")
}

/// Unique artifact name for one request. Characters that are unsafe in file
/// names are replaced with `_`.
pub fn artifact_file_name(symbol: &str, interval: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    };
    format!(
        "{}_{}_{}.png",
        clean(symbol),
        clean(interval),
        uuid::Uuid::new_v4().simple()
    )
}

/// Render `series` with every pattern in `patterns` overlaid.
pub fn compose(
    series: &CandleSeries,
    patterns: &PatternSet,
    symbol: &str,
    interval: &str,
    options: &ChartOptions,
) -> Result<ChartArtifact, SignalError> {
    if series.is_empty() {
        return Err(SignalError::RenderingFailure(
            "cannot draw a chart without candles".into(),
        ));
    }

    let title = chart_title(symbol, interval, &options.engine_label);
    let scene = ChartScene::build(series, patterns, title, &options.geometry);
    let canvas = raster::paint(&scene, options.width, options.height, options.arrow_length_px)?;
    let png = canvas.encode_png()?;

    debug!(
        symbol,
        interval,
        candles = scene.candles.len(),
        overlays = scene.overlays.len(),
        bytes = png.len(),
        "chart composed"
    );

    Ok(ChartArtifact {
        file_name: artifact_file_name(symbol, interval),
        png,
        overlays: scene.overlays.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::detect_all;
    use image::GenericImageView;

    fn series(n: usize) -> CandleSeries {
        let rows: Vec<(f64, f64, f64, f64)> = (0..n)
            .map(|i| {
                let b = 100.0 + (i as f64 * 0.7).sin() * 8.0 + i as f64 * 0.3;
                if i % 3 == 0 {
                    (b + 1.5, b + 3.0, b - 2.0, b - 1.0)
                } else {
                    (b - 1.0, b + 2.5, b - 1.5, b + 1.5)
                }
            })
            .collect();
        CandleSeries::from_ohlc(&rows)
    }

    #[test]
    fn title_format() {
        assert_eq!(chart_title("BTCUSDT", "15m", "SMC v2.7 Clean"), "BTCUSDT | 15m | SMC v2.7 Clean");
    }

    #[test]
    fn artifact_names_are_unique_and_sanitized() {
        let a = artifact_file_name("BTC/USDT", "15m");
        let b = artifact_file_name("BTC/USDT", "15m");
        assert_ne!(a, b);
        assert!(a.starts_with("BTC_USDT_15m_"));
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn compose_produces_png_with_configured_size() {
        let s = series(150);
        let patterns = detect_all(&s, 2);
        let opts = ChartOptions::default();
        let artifact = compose(&s, &patterns, "BTCUSDT", "15m", &opts).unwrap();
        assert_eq!(artifact.overlays, patterns.total());

        let img = image::load_from_memory(&artifact.png).unwrap();
        assert_eq!(img.dimensions(), (opts.width, opts.height));
        // Corners stay white background.
        assert_eq!(img.get_pixel(0, opts.height - 1).0[..3], [255, 255, 255]);
    }

    #[test]
    fn compose_without_patterns_is_valid() {
        let s = series(10);
        let artifact = compose(&s, &PatternSet::default(), "ETHUSDT", "1h", &ChartOptions::default()).unwrap();
        assert_eq!(artifact.overlays, 0);
        assert!(image::load_from_memory(&artifact.png).is_ok());
    }

    #[test]
    fn compose_single_candle() {
        let s = series(1);
        assert!(compose(&s, &detect_all(&s, 2), "X", "1m", &ChartOptions::default()).is_ok());
    }

    #[test]
    fn compose_empty_series_fails() {
        let s = CandleSeries::from_ohlc(&[]);
        let err = compose(&s, &PatternSet::default(), "X", "1m", &ChartOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "RenderingFailure");
    }

    #[test]
    fn persist_writes_named_file() {
        let s = series(12);
        let artifact = compose(&s, &PatternSet::default(), "SOLUSDT", "5m", &ChartOptions::default()).unwrap();
        let dir = std::env::temp_dir().join(format!("smc-chart-test-{}", uuid::Uuid::new_v4().simple()));
        let path = artifact.persist(&dir).unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), artifact.file_name);
        assert_eq!(std::fs::read(&path).unwrap(), artifact.png);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
