//! Placement geometry for watermark text.
//!
//! Pure functions from (canvas, text extent, margins, position) to the draw
//! operations a renderer has to perform. Nothing here touches fonts or
//! pixels; renderers measure the text once and pass a [`TextExtent`] in.
//!
//! # Position Modes
//!
//! - **Single anchor**: Center, TopLeft, TopRight, BottomLeft, BottomRight
//! - **Diagonal**: a grid of copies covering the whole canvas, each rotated
//!   about its own text box center
//!
//! Coordinates are baseline-left text origins. With [`Origin::TopLeft`] the
//! y axis points down; with [`Origin::BottomLeft`] the engine mirrors every
//! instruction so PDF renderers can use the result directly.
//!
//! # Example
//!
//! ```ignore
//! use docmark::watermark::position::{Canvas, Margins, PlacementPlan, TextExtent};
//! use docmark::watermark::WatermarkPosition;
//!
//! let canvas = Canvas::pixels(800, 600);
//! let extent = TextExtent::new(100.0, 20.0);
//! let margins = Margins::new(20.0, 20.0);
//!
//! let plan = PlacementPlan::new(WatermarkPosition::TopLeft, 0.0, &canvas, extent, margins);
//! let first = plan.instructions().next().unwrap();
//! assert_eq!((first.x, first.y), (20.0, 40.0));
//! ```

use std::iter::FusedIterator;

use super::config::{WatermarkConfig, WatermarkPosition};
use super::fonts::FontMetrics;

/// Divisor for margins that scale with the canvas.
const MARGIN_FRACTION: f32 = 50.0;

/// Which corner is `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Raster images, spreadsheet canvases.
    TopLeft,
    /// PDF user space.
    BottomLeft,
}

/// Units of a canvas. The engine does not convert between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Pixel,
    Point,
    Percentage,
}

/// The surface a watermark is placed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f32,
    pub height: f32,
    pub origin: Origin,
    pub unit: Unit,
}

impl Canvas {
    pub fn new(width: f32, height: f32, origin: Origin, unit: Unit) -> Self {
        Self {
            width: non_negative(width),
            height: non_negative(height),
            origin,
            unit,
        }
    }

    /// Top-left pixel canvas.
    pub fn pixels(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32, Origin::TopLeft, Unit::Pixel)
    }

    /// Bottom-left point canvas.
    pub fn points(width: f32, height: f32) -> Self {
        Self::new(width, height, Origin::BottomLeft, Unit::Point)
    }

    fn mirror_y(&self, y: f32) -> f32 {
        match self.origin {
            Origin::TopLeft => y,
            Origin::BottomLeft => self.height - y,
        }
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Distance kept from the canvas edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub x: f32,
    pub y: f32,
}

impl Margins {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// `max(fixed_minimum, dimension / 50)` per axis.
    pub fn for_canvas(canvas: &Canvas, fixed_minimum: f32) -> Self {
        Self {
            x: fixed_minimum.max(canvas.width / MARGIN_FRACTION),
            y: fixed_minimum.max(canvas.height / MARGIN_FRACTION),
        }
    }
}

/// Measured size of the watermark text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub line_height: f32,
}

impl TextExtent {
    pub fn new(width: f32, line_height: f32) -> Self {
        Self {
            width: non_negative(width),
            line_height: non_negative(line_height),
        }
    }

    pub fn measure(metrics: &dyn FontMetrics, text: &str) -> Self {
        Self::new(metrics.text_width(text), metrics.line_height())
    }
}

/// One draw of the watermark text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementInstruction {
    /// Baseline-left x of the text.
    pub x: f32,
    /// Baseline-left y of the text.
    pub y: f32,
    pub rotation_center_x: f32,
    pub rotation_center_y: f32,
    /// Clockwise as seen on the rendered page.
    pub rotation_degrees: f32,
}

impl PlacementInstruction {
    /// Build an instruction from top-left coordinates, mirroring for
    /// bottom-left canvases.
    fn on_canvas(canvas: &Canvas, extent: TextExtent, x: f32, y: f32, rotation: f32) -> Self {
        let center_x = x + extent.width / 2.0;
        let center_y = y - extent.line_height / 2.0;
        Self {
            x,
            y: canvas.mirror_y(y),
            rotation_center_x: center_x,
            rotation_center_y: canvas.mirror_y(center_y),
            rotation_degrees: rotation,
        }
    }
}

/// Single-anchor placement, clamped into the canvas.
pub fn calculate_anchor(
    position: WatermarkPosition,
    canvas: &Canvas,
    extent: TextExtent,
    margins: Margins,
    rotation_degrees: f32,
) -> PlacementInstruction {
    let (w, h) = (canvas.width, canvas.height);
    let (tw, lh) = (extent.width, extent.line_height);
    let (mx, my) = (margins.x, margins.y);

    let (x, y) = match position {
        WatermarkPosition::TopLeft => (mx, my + lh),
        WatermarkPosition::TopRight => (w - tw - mx, my + lh),
        WatermarkPosition::BottomLeft => (mx, h - my),
        WatermarkPosition::BottomRight => (w - tw - mx, h - my),
        // Diagonal is tiled; anything routed here falls back to center
        WatermarkPosition::Center | WatermarkPosition::Diagonal => {
            ((w - tw) / 2.0, (h + lh) / 2.0)
        }
    };

    let x = x.max(0.0).min(w);
    let y = y.max(0.0).min(h);
    PlacementInstruction::on_canvas(canvas, extent, x, y, rotation_degrees)
}

/// Repeat grid for diagonal mode.
///
/// Covers `[0, rows] x [0, cols]` inclusive, row-major. The grid is `Copy`
/// and every call to [`TileGrid::iter`] restarts from the first tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    canvas: Canvas,
    extent: TextExtent,
    x_step: f32,
    y_step: f32,
    cols: usize,
    rows: usize,
    rotation_degrees: f32,
}

impl TileGrid {
    pub fn new(
        canvas: &Canvas,
        extent: TextExtent,
        margins: Margins,
        rotation_degrees: f32,
    ) -> Self {
        let x_step = (extent.width + margins.x).max(margins.x).max(1.0);
        let y_step = (extent.line_height + margins.y).max(margins.y).max(1.0);
        let cols = (canvas.width / x_step).ceil() as usize + 1;
        let rows = (canvas.height / y_step).ceil() as usize + 1;

        Self {
            canvas: *canvas,
            extent,
            x_step,
            y_step,
            cols,
            rows,
            rotation_degrees,
        }
    }

    pub fn x_step(&self) -> f32 {
        self.x_step
    }

    pub fn y_step(&self) -> f32 {
        self.y_step
    }

    /// Highest column index.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Highest row index.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of tiles, `(rows + 1) * (cols + 1)`.
    pub fn len(&self) -> usize {
        (self.rows + 1) * (self.cols + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn instruction(&self, row: usize, col: usize) -> PlacementInstruction {
        let x = col as f32 * self.x_step;
        let y = row as f32 * self.y_step + self.extent.line_height;
        PlacementInstruction::on_canvas(&self.canvas, self.extent, x, y, self.rotation_degrees)
    }

    pub fn iter(&self) -> TileIter {
        TileIter {
            grid: *self,
            next: 0,
        }
    }
}

impl IntoIterator for &TileGrid {
    type Item = PlacementInstruction;
    type IntoIter = TileIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy row-major walk over a [`TileGrid`].
#[derive(Debug, Clone)]
pub struct TileIter {
    grid: TileGrid,
    next: usize,
}

impl Iterator for TileIter {
    type Item = PlacementInstruction;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.grid.len() {
            return None;
        }
        let per_row = self.grid.cols + 1;
        let (row, col) = (self.next / per_row, self.next % per_row);
        self.next += 1;
        Some(self.grid.instruction(row, col))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileIter {}
impl FusedIterator for TileIter {}

/// Everything a renderer draws for one unit (image, page, canvas).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementPlan {
    Single(PlacementInstruction),
    Tiled(TileGrid),
}

impl PlacementPlan {
    /// Plan from an already measured text extent.
    pub fn new(
        position: WatermarkPosition,
        rotation_degrees: f32,
        canvas: &Canvas,
        extent: TextExtent,
        margins: Margins,
    ) -> Self {
        if position.is_tiled() {
            Self::Tiled(TileGrid::new(canvas, extent, margins, rotation_degrees))
        } else {
            Self::Single(calculate_anchor(
                position,
                canvas,
                extent,
                margins,
                rotation_degrees,
            ))
        }
    }

    /// Measure the configured text and plan its placement on `canvas`.
    pub fn compute(
        config: &WatermarkConfig,
        canvas: &Canvas,
        metrics: &dyn FontMetrics,
        fixed_minimum_margin: f32,
    ) -> Self {
        let extent = TextExtent::measure(metrics, config.text());
        let margins = Margins::for_canvas(canvas, fixed_minimum_margin);
        Self::new(
            config.position(),
            config.rotation_degrees(),
            canvas,
            extent,
            margins,
        )
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Tiled(grid) => grid.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn instructions(&self) -> Instructions {
        match self {
            Self::Single(instruction) => Instructions::Single(Some(*instruction)),
            Self::Tiled(grid) => Instructions::Tiled(grid.iter()),
        }
    }
}

/// Iterator over the instructions of a [`PlacementPlan`].
#[derive(Debug, Clone)]
pub enum Instructions {
    Single(Option<PlacementInstruction>),
    Tiled(TileIter),
}

impl Iterator for Instructions {
    type Item = PlacementInstruction;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Single(instruction) => instruction.take(),
            Self::Tiled(tiles) => tiles.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Single(instruction) => {
                let n = usize::from(instruction.is_some());
                (n, Some(n))
            }
            Self::Tiled(tiles) => tiles.size_hint(),
        }
    }
}

impl ExactSizeIterator for Instructions {}
impl FusedIterator for Instructions {}
