// =============================================================================
// Chart coordinates — world-to-pixel mapping
// =============================================================================
//
// World space (`Bounds`): x in candle-index units, y in price.
// Pixel space (`PlotRect`): image pixels from the top-left corner, y down.
// =============================================================================

/// World-space extent of everything drawn on the chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    /// Bounds of a single point.
    pub fn point(x: f64, y: f64) -> Self {
        Self { x_min: x, x_max: x, y_min: y, y_max: y }
    }

    /// Grow to cover the rectangle spanning `x0..x1` and `y0..y1`.
    pub fn include_rect(&mut self, x0: f64, x1: f64, y0: f64, y1: f64) {
        self.x_min = self.x_min.min(x0.min(x1));
        self.x_max = self.x_max.max(x0.max(x1));
        self.y_min = self.y_min.min(y0.min(y1));
        self.y_max = self.y_max.max(y0.max(y1));
    }

    pub fn is_finite(&self) -> bool {
        [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Pad horizontally by `dx` index units and vertically by `fraction` of
    /// the price span. A flat price span is widened so the mapping stays
    /// invertible.
    pub fn padded(&self, dx: f64, fraction: f64) -> Self {
        let span = self.y_max - self.y_min;
        let dy = if span > f64::EPSILON {
            span * fraction
        } else {
            (self.y_max.abs() * 0.01).max(1.0)
        };
        Self {
            x_min: self.x_min - dx,
            x_max: self.x_max + dx,
            y_min: self.y_min - dy,
            y_max: self.y_max + dy,
        }
    }
}

/// Pixel rectangle the price area is drawn into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Maps world coordinates into a [`PlotRect`].
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    world: Bounds,
    rect: PlotRect,
}

impl Viewport {
    /// Returns `None` when either space is empty or non-finite.
    pub fn new(world: Bounds, rect: PlotRect) -> Option<Self> {
        let usable = world.is_finite()
            && world.x_max > world.x_min
            && world.y_max > world.y_min
            && rect.width > 0.0
            && rect.height > 0.0;
        usable.then_some(Self { world, rect })
    }

    pub fn x(&self, index: f64) -> f64 {
        self.rect.left
            + (index - self.world.x_min) / (self.world.x_max - self.world.x_min) * self.rect.width
    }

    pub fn y(&self, price: f64) -> f64 {
        self.rect.top
            + (self.world.y_max - price) / (self.world.y_max - self.world.y_min) * self.rect.height
    }

    /// Pixels per candle-index unit.
    pub fn x_scale(&self) -> f64 {
        self.rect.width / (self.world.x_max - self.world.x_min)
    }
}
