// =============================================================================
// Chart Scene — detector output mapped onto chart geometry
// =============================================================================
//
// The scene is pure geometry in world space (candle index, price).  Every
// detected pattern becomes exactly one `Overlay`; nothing is merged or
// dropped, so the rasterized image shows one element per pattern.

use crate::chart::coords::Bounds;
use crate::detectors::{Imbalance, OrderBlock, PatternSet, StructureBreak};
use crate::market_data::CandleSeries;
use crate::types::{BreakDirection, ZoneDirection};

/// Horizontal extents used when laying out glyphs, in index units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneGeometry {
    pub candle_half_width: f64,
    pub order_block_half_width: f64,
    pub imbalance_half_width: f64,
}

impl Default for SceneGeometry {
    fn default() -> Self {
        Self {
            candle_half_width: 0.25,
            order_block_half_width: 3.0,
            imbalance_half_width: 1.5,
        }
    }
}

/// One candle: a wick from `low` to `high` and a body over `body_low..body_high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleGlyph {
    pub x: f64,
    pub low: f64,
    pub high: f64,
    pub body_low: f64,
    pub body_high: f64,
    pub bullish: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    OrderBlock(ZoneDirection),
    Imbalance,
}

/// A single annotation layered over the candles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Overlay {
    /// Translucent price band spanning `x0..x1`.
    Zone {
        kind: ZoneKind,
        anchor_index: usize,
        x0: f64,
        x1: f64,
        price_low: f64,
        price_high: f64,
    },
    /// Arrow rooted at `level`, pointing away from price in `direction`.
    Arrow {
        direction: BreakDirection,
        anchor_index: usize,
        level: f64,
    },
}

impl Overlay {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Zone { kind: ZoneKind::OrderBlock(_), .. } => "OB",
            Self::Zone { kind: ZoneKind::Imbalance, .. } => "FVG",
            Self::Arrow { .. } => "BoS",
        }
    }

    fn order_block(ob: &OrderBlock, half_width: f64) -> Self {
        let x = ob.anchor_index as f64;
        Self::Zone {
            kind: ZoneKind::OrderBlock(ob.direction),
            anchor_index: ob.anchor_index,
            x0: x - half_width,
            x1: x + half_width,
            price_low: ob.price_low,
            price_high: ob.price_high,
        }
    }

    fn imbalance(fvg: &Imbalance, half_width: f64) -> Self {
        let x = fvg.anchor_index as f64;
        Self::Zone {
            kind: ZoneKind::Imbalance,
            anchor_index: fvg.anchor_index,
            x0: x - half_width,
            x1: x + half_width,
            price_low: fvg.price_low,
            price_high: fvg.price_high,
        }
    }

    fn structure_break(bos: &StructureBreak) -> Self {
        Self::Arrow {
            direction: bos.direction,
            anchor_index: bos.anchor_index,
            level: bos.level,
        }
    }
}

/// Everything the rasterizer needs, in world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartScene {
    pub title: String,
    pub candle_half_width: f64,
    pub candles: Vec<CandleGlyph>,
    pub overlays: Vec<Overlay>,
}

impl ChartScene {
    /// Lay out `series` and all of `patterns`. Zones are listed before arrows
    /// so arrows paint on top.
    pub fn build(
        series: &CandleSeries,
        patterns: &PatternSet,
        title: String,
        geometry: &SceneGeometry,
    ) -> Self {
        let candles = series
            .candles()
            .iter()
            .map(|c| CandleGlyph {
                x: c.index as f64,
                low: c.low,
                high: c.high,
                body_low: c.body_low(),
                body_high: c.body_high(),
                bullish: c.is_bullish(),
            })
            .collect();

        let overlays = patterns
            .order_blocks
            .iter()
            .map(|ob| Overlay::order_block(ob, geometry.order_block_half_width))
            .chain(
                patterns
                    .imbalances
                    .iter()
                    .map(|fvg| Overlay::imbalance(fvg, geometry.imbalance_half_width)),
            )
            .chain(patterns.structure_breaks.iter().map(Overlay::structure_break))
            .collect();

        Self {
            title,
            candle_half_width: geometry.candle_half_width,
            candles,
            overlays,
        }
    }

    /// World extent of candles and overlays, unpadded. `None` for an empty
    /// scene.
    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.candles.first()?;
        let mut b = Bounds::point(first.x, first.low);
        for c in &self.candles {
            b.include_rect(
                c.x - self.candle_half_width,
                c.x + self.candle_half_width,
                c.low,
                c.high,
            );
        }
        for o in &self.overlays {
            match *o {
                Overlay::Zone { x0, x1, price_low, price_high, .. } => {
                    b.include_rect(x0, x1, price_low, price_high);
                }
                Overlay::Arrow { anchor_index, level, .. } => {
                    let x = anchor_index as f64;
                    b.include_rect(x, x, level, level);
                }
            }
        }
        Some(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::detect_all;

    fn series() -> CandleSeries {
        CandleSeries::from_ohlc(&[
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (110.0, 150.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (101.0, 103.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (120.0, 130.0, 115.0, 128.0),
            (128.0, 129.0, 126.0, 127.0),
        ])
    }

    #[test]
    fn one_overlay_per_pattern() {
        let s = series();
        let patterns = detect_all(&s, 2);
        assert!(patterns.total() > 0);
        let scene = ChartScene::build(&s, &patterns, "T".into(), &SceneGeometry::default());
        assert_eq!(scene.candles.len(), s.len());
        assert_eq!(scene.overlays.len(), patterns.total());

        let obs = scene.overlays.iter().filter(|o| o.label() == "OB").count();
        let fvgs = scene.overlays.iter().filter(|o| o.label() == "FVG").count();
        let bos = scene.overlays.iter().filter(|o| o.label() == "BoS").count();
        assert_eq!(obs, patterns.order_blocks.len());
        assert_eq!(fvgs, patterns.imbalances.len());
        assert_eq!(bos, patterns.structure_breaks.len());
    }

    #[test]
    fn empty_patterns_render_candles_only() {
        let s = series();
        let scene = ChartScene::build(&s, &PatternSet::default(), "T".into(), &SceneGeometry::default());
        assert!(scene.overlays.is_empty());
        assert_eq!(scene.candles.len(), 8);
        assert!(scene.bounds().is_some());
    }

    #[test]
    fn zone_windows_follow_geometry() {
        let s = series();
        let patterns = PatternSet {
            order_blocks: vec![OrderBlock {
                anchor_index: 4,
                price_low: 101.0,
                price_high: 103.0,
                direction: ZoneDirection::Bearish,
            }],
            imbalances: vec![Imbalance { anchor_index: 6, price_low: 103.0, price_high: 115.0 }],
            structure_breaks: vec![],
        };
        let scene = ChartScene::build(&s, &patterns, "T".into(), &SceneGeometry::default());
        match scene.overlays[0] {
            Overlay::Zone { kind, x0, x1, .. } => {
                assert_eq!(kind, ZoneKind::OrderBlock(ZoneDirection::Bearish));
                assert!((x0 - 1.0).abs() < 1e-9);
                assert!((x1 - 7.0).abs() < 1e-9);
            }
            other => panic!("expected zone, got {other:?}"),
        }
        match scene.overlays[1] {
            Overlay::Zone { kind, x0, x1, .. } => {
                assert_eq!(kind, ZoneKind::Imbalance);
                assert!((x0 - 4.5).abs() < 1e-9);
                assert!((x1 - 7.5).abs() < 1e-9);
            }
            other => panic!("expected zone, got {other:?}"),
        }
        let b = scene.bounds().unwrap();
        assert!((b.x_max - 7.5).abs() < 1e-9);
        assert!((b.y_max - 150.0).abs() < 1e-9);
    }

    #[test]
    fn bodies_use_open_close_extent() {
        let s = CandleSeries::from_ohlc(&[(105.0, 110.0, 95.0, 98.0)]);
        let scene = ChartScene::build(&s, &PatternSet::default(), "T".into(), &SceneGeometry::default());
        let g = scene.candles[0];
        assert!(!g.bullish);
        assert!((g.body_low - 98.0).abs() < f64::EPSILON);
        assert!((g.body_high - 105.0).abs() < f64::EPSILON);
    }
}
