// =============================================================================
// Rasterizer — paints a ChartScene onto an RGB canvas and encodes PNG
// =============================================================================

use std::io::Cursor;

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{ImageFormat, Rgb, RgbImage};

use crate::chart::coords::{PlotRect, Viewport};
use crate::chart::scene::{ChartScene, Overlay, ZoneKind};
use crate::error::SignalError;
use crate::types::{BreakDirection, ZoneDirection};

/// Height of the title band above the plot area.
const TITLE_BAND_PX: f64 = 30.0;
/// Margin around the plot area on the remaining sides.
const MARGIN_PX: f64 = 12.0;
/// Horizontal padding around the outermost glyphs, in index units.
const X_PAD: f64 = 0.5;
/// Vertical padding as a fraction of the price span.
const Y_PAD_FRACTION: f64 = 0.05;
const GLYPH_PX: i64 = 8;

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: f32,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, alpha: 1.0 }
    }

    pub const fn with_alpha(self, alpha: f32) -> Self {
        Self { alpha, ..self }
    }
}

pub const WHITE: Color = Color::rgb(255, 255, 255);
pub const BLACK: Color = Color::rgb(0, 0, 0);
pub const BULL_CANDLE: Color = Color::rgb(0x2c, 0xa0, 0x2c);
pub const BEAR_CANDLE: Color = Color::rgb(0xd6, 0x27, 0x28);
pub const BEARISH_BLOCK: Color = Color::rgb(220, 20, 20);
pub const BULLISH_BLOCK: Color = Color::rgb(30, 80, 220);
pub const IMBALANCE: Color = Color::rgb(255, 165, 0);
pub const BREAK_UP: Color = Color::rgb(0, 128, 0);
pub const BREAK_DOWN: Color = Color::rgb(220, 20, 20);

const ZONE_ALPHA: f32 = 0.2;
const BODY_ALPHA: f32 = 0.9;

/// Fill colour of an overlay (opaque; zones are blended at [`ZONE_ALPHA`]).
pub fn overlay_color(overlay: &Overlay) -> Color {
    match overlay {
        Overlay::Zone { kind: ZoneKind::OrderBlock(ZoneDirection::Bearish), .. } => BEARISH_BLOCK,
        Overlay::Zone { kind: ZoneKind::OrderBlock(ZoneDirection::Bullish), .. } => BULLISH_BLOCK,
        Overlay::Zone { kind: ZoneKind::Imbalance, .. } => IMBALANCE,
        Overlay::Arrow { direction: BreakDirection::Up, .. } => BREAK_UP,
        Overlay::Arrow { direction: BreakDirection::Down, .. } => BREAK_DOWN,
    }
}

// ---------------------------------------------------------------------------
// Canvas
// ---------------------------------------------------------------------------

/// Thin drawing layer over an [`RgbImage`] with alpha blending and clipping.
pub struct Canvas {
    img: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        let bg = Rgb([background.r, background.g, background.b]);
        Self { img: RgbImage::from_pixel(width, height, bg) }
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.img.get_pixel_checked(x, y).map(|p| p.0)
    }

    fn blend(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        let px = self.img.get_pixel_mut(x as u32, y as u32);
        let a = color.alpha.clamp(0.0, 1.0);
        let mix = |dst: u8, src: u8| -> u8 {
            (f32::from(src) * a + f32::from(dst) * (1.0 - a)).round() as u8
        };
        px.0 = [mix(px.0[0], color.r), mix(px.0[1], color.g), mix(px.0[2], color.b)];
    }

    /// Fill the axis-aligned rectangle between two corners. Always covers at
    /// least one pixel in each direction so thin zones stay visible.
    pub fn fill_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Color) {
        let (left, right) = (x0.min(x1).round() as i64, x0.max(x1).round() as i64);
        let (top, bottom) = (y0.min(y1).round() as i64, y0.max(y1).round() as i64);
        for y in top..=bottom.max(top) {
            for x in left..=right.max(left) {
                self.blend(x, y, color);
            }
        }
    }

    pub fn vline(&mut self, x: f64, y0: f64, y1: f64, color: Color) {
        let xi = x.round() as i64;
        let (top, bottom) = (y0.min(y1).round() as i64, y0.max(y1).round() as i64);
        for y in top..=bottom {
            self.blend(xi, y, color);
        }
    }

    /// Fill a triangle using edge functions over its bounding box.
    pub fn fill_triangle(&mut self, pts: [(f64, f64); 3], color: Color) {
        let edge = |a: (f64, f64), b: (f64, f64), p: (f64, f64)| {
            (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
        };
        let area = edge(pts[0], pts[1], pts[2]);
        if area.abs() < f64::EPSILON {
            return;
        }
        let min_x = pts.iter().map(|p| p.0).fold(f64::INFINITY, f64::min).floor() as i64;
        let max_x = pts.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max).ceil() as i64;
        let min_y = pts.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).floor() as i64;
        let max_y = pts.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max).ceil() as i64;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = (x as f64 + 0.5, y as f64 + 0.5);
                let w0 = edge(pts[1], pts[2], p) * area.signum();
                let w1 = edge(pts[2], pts[0], p) * area.signum();
                let w2 = edge(pts[0], pts[1], p) * area.signum();
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    self.blend(x, y, color);
                }
            }
        }
    }

    /// Draw `text` with its top-left corner at `(x, y)`. Characters missing
    /// from the basic Latin set render as `?`.
    pub fn text(&mut self, x: f64, y: f64, text: &str, color: Color, scale: i64) {
        let (ox, oy) = (x.round() as i64, y.round() as i64);
        for (n, ch) in text.chars().enumerate() {
            let glyph = BASIC_FONTS
                .get(ch)
                .or_else(|| BASIC_FONTS.get('?'))
                .unwrap_or([0; 8]);
            let gx = ox + n as i64 * GLYPH_PX * scale;
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..8 {
                    if bits & (1u8 << col) == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            self.blend(
                                gx + col * scale + sx,
                                oy + row as i64 * scale + sy,
                                color,
                            );
                        }
                    }
                }
            }
        }
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, SignalError> {
        let mut buf = Cursor::new(Vec::new());
        self.img
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| SignalError::RenderingFailure(format!("PNG encoding failed: {e}")))?;
        Ok(buf.into_inner())
    }
}

/// Pixel width of `text` at `scale`.
pub fn text_width(text: &str, scale: i64) -> f64 {
    (text.chars().count() as i64 * GLYPH_PX * scale) as f64
}

// ---------------------------------------------------------------------------
// Scene painting
// ---------------------------------------------------------------------------

/// Paint `scene` onto a fresh `width` x `height` canvas.
pub fn paint(scene: &ChartScene, width: u32, height: u32, arrow_px: f64) -> Result<Canvas, SignalError> {
    let bounds = scene
        .bounds()
        .ok_or_else(|| SignalError::RenderingFailure("nothing to draw: empty candle series".into()))?
        .padded(X_PAD, Y_PAD_FRACTION);

    // Arrows are sized in pixels; keep them inside the plot by insetting the
    // price area by one arrow length plus room for the label.
    let inset = arrow_px + GLYPH_PX as f64 + 4.0;
    let rect = PlotRect {
        left: MARGIN_PX,
        top: TITLE_BAND_PX + inset,
        width: f64::from(width) - 2.0 * MARGIN_PX,
        height: f64::from(height) - TITLE_BAND_PX - MARGIN_PX - 2.0 * inset,
    };
    let vp = Viewport::new(bounds, rect).ok_or_else(|| {
        SignalError::RenderingFailure(format!(
            "degenerate chart geometry ({width}x{height} px, bounds {bounds:?})"
        ))
    })?;

    let mut canvas = Canvas::new(width, height, WHITE);

    for overlay in scene.overlays.iter().filter(|o| matches!(o, Overlay::Zone { .. })) {
        paint_zone(&mut canvas, &vp, overlay);
    }

    let half = scene.candle_half_width * vp.x_scale();
    for c in &scene.candles {
        let x = vp.x(c.x);
        canvas.vline(x, vp.y(c.low), vp.y(c.high), BLACK);
        let body = if c.bullish { BULL_CANDLE } else { BEAR_CANDLE };
        canvas.fill_rect(x - half, vp.y(c.body_low), x + half, vp.y(c.body_high), body.with_alpha(BODY_ALPHA));
    }

    for overlay in scene.overlays.iter().filter(|o| matches!(o, Overlay::Arrow { .. })) {
        paint_arrow(&mut canvas, &vp, overlay, arrow_px);
    }

    let title_x = ((f64::from(width) - text_width(&scene.title, 2)) / 2.0).max(MARGIN_PX);
    canvas.text(title_x, (TITLE_BAND_PX - 16.0) / 2.0, &scene.title, BLACK, 2);

    Ok(canvas)
}

fn paint_zone(canvas: &mut Canvas, vp: &Viewport, overlay: &Overlay) {
    let Overlay::Zone { anchor_index, x0, x1, price_low, price_high, kind } = *overlay else {
        return;
    };
    let color = overlay_color(overlay);
    canvas.fill_rect(vp.x(x0), vp.y(price_low), vp.x(x1), vp.y(price_high), color.with_alpha(ZONE_ALPHA));

    let label_color = match kind {
        ZoneKind::Imbalance => IMBALANCE,
        ZoneKind::OrderBlock(_) => BLACK,
    };
    let top = vp.y(price_high);
    canvas.text(vp.x(anchor_index as f64), top - GLYPH_PX as f64 - 1.0, overlay.label(), label_color, 1);
}

fn paint_arrow(canvas: &mut Canvas, vp: &Viewport, overlay: &Overlay, arrow_px: f64) {
    let Overlay::Arrow { direction, anchor_index, level } = *overlay else {
        return;
    };
    let color = overlay_color(overlay);
    let x = vp.x(anchor_index as f64);
    let base = vp.y(level);
    // Up breaks point up from the high, down breaks point down from the low.
    let sign = match direction {
        BreakDirection::Up => -1.0,
        BreakDirection::Down => 1.0,
    };
    let tip = base + sign * arrow_px;
    let head = (arrow_px / 3.0).max(4.0);

    for dx in [-0.5, 0.0, 0.5] {
        canvas.vline(x + dx, base + sign * 2.0, tip - sign * head, color);
    }
    canvas.fill_triangle([(x, tip), (x - head / 2.0, tip - sign * head), (x + head / 2.0, tip - sign * head)], color);

    let label_y = match direction {
        BreakDirection::Up => tip - GLYPH_PX as f64 - 2.0,
        BreakDirection::Down => tip + 2.0,
    };
    canvas.text(x + 3.0, label_y, overlay.label(), color, 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::scene::SceneGeometry;
    use crate::detectors::{PatternSet, StructureBreak};
    use crate::market_data::CandleSeries;

    #[test]
    fn blend_mixes_towards_color() {
        let mut canvas = Canvas::new(4, 4, WHITE);
        canvas.fill_rect(0.0, 0.0, 1.0, 1.0, BLACK.with_alpha(0.5));
        let p = canvas.pixel(0, 0).unwrap();
        assert!(p[0] > 120 && p[0] < 135);
        assert_eq!(canvas.pixel(3, 3), Some([255, 255, 255]));
    }

    #[test]
    fn drawing_outside_canvas_is_clipped() {
        let mut canvas = Canvas::new(4, 4, WHITE);
        canvas.fill_rect(-10.0, -10.0, 100.0, 100.0, BLACK);
        canvas.text(-50.0, 2.0, "OB", BLACK, 1);
        canvas.vline(-3.0, 0.0, 10.0, BLACK);
        assert_eq!(canvas.pixel(2, 2), Some([0, 0, 0]));
    }

    #[test]
    fn triangle_covers_interior_only() {
        let mut canvas = Canvas::new(20, 20, WHITE);
        canvas.fill_triangle([(10.0, 2.0), (2.0, 18.0), (18.0, 18.0)], BLACK);
        assert_eq!(canvas.pixel(10, 12), Some([0, 0, 0]));
        assert_eq!(canvas.pixel(1, 1), Some([255, 255, 255]));
    }

    #[test]
    fn text_sets_glyph_pixels() {
        let mut canvas = Canvas::new(40, 16, WHITE);
        canvas.text(0.0, 0.0, "OB", BLACK, 1);
        let dark = (0..16)
            .flat_map(|x| (0..8).map(move |y| (x, y)))
            .filter(|&(x, y)| canvas.pixel(x, y) == Some([0, 0, 0]))
            .count();
        assert!(dark > 10);
        assert!((text_width("FVG", 2) - 48.0).abs() < f64::EPSILON);
    }

    #[test]
    fn up_arrow_paints_above_level() {
        let series = CandleSeries::from_ohlc(&[
            (100.0, 102.0, 99.0, 101.0),
            (101.0, 103.0, 100.0, 102.0),
            (102.0, 104.0, 101.0, 103.0),
        ]);
        let patterns = PatternSet {
            structure_breaks: vec![StructureBreak {
                direction: BreakDirection::Up,
                anchor_index: 2,
                level: 104.0,
            }],
            ..PatternSet::default()
        };
        let scene = ChartScene::build(&series, &patterns, "T".into(), &SceneGeometry::default());
        let canvas = paint(&scene, 300, 200, 30.0).unwrap();

        let bounds = scene.bounds().unwrap().padded(X_PAD, Y_PAD_FRACTION);
        let inset = 30.0 + 8.0 + 4.0;
        let vp = Viewport::new(
            bounds,
            PlotRect { left: MARGIN_PX, top: TITLE_BAND_PX + inset, width: 300.0 - 2.0 * MARGIN_PX, height: 200.0 - TITLE_BAND_PX - MARGIN_PX - 2.0 * inset },
        )
        .unwrap();
        let x = vp.x(2.0).round() as u32;
        let y = (vp.y(104.0) - 15.0).round() as u32;
        assert_eq!(canvas.pixel(x, y), Some([BREAK_UP.r, BREAK_UP.g, BREAK_UP.b]));
    }

    #[test]
    fn empty_scene_is_rendering_failure() {
        let scene = ChartScene {
            title: "T".into(),
            candle_half_width: 0.25,
            candles: vec![],
            overlays: vec![],
        };
        let err = paint(&scene, 300, 200, 30.0).err().unwrap();
        assert_eq!(err.kind(), "RenderingFailure");
    }

    #[test]
    fn tiny_canvas_is_rendering_failure() {
        let series = CandleSeries::from_ohlc(&[(100.0, 102.0, 99.0, 101.0)]);
        let scene = ChartScene::build(&series, &PatternSet::default(), "T".into(), &SceneGeometry::default());
        assert!(paint(&scene, 20, 20, 30.0).is_err());
    }
}
