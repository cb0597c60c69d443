//! PDF page renderer.
//!
//! Every page is planned on its own bottom-left point canvas built from the
//! page's MediaBox as the page is displayed, so `/Rotate` swaps the canvas
//! sides for quarter turns. The renderer only decides where text goes; the
//! [`PageHost`] turns a [`TextStamp`] into content-stream operators.

use tracing::{debug, info};

use super::RenderReport;
use crate::error::RenderError;
use crate::watermark::{
    Canvas, Color, PlacementInstruction, PlacementPlan, ResolvedFont, WatermarkConfig,
};

pub const DEFAULT_MIN_MARGIN_PT: f32 = 20.0;

/// A page's MediaBox in default user space, plus its display rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    /// Lower-left corner.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Clockwise display rotation: 0, 90, 180 or 270.
    pub rotation: u16,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            rotation: 0,
        }
    }

    /// From `[llx lly urx ury]`, tolerating swapped corners.
    pub fn from_media_box(rect: [f32; 4]) -> Self {
        let [x0, y0, x1, y1] = rect;
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
            rotation: 0,
        }
    }

    /// Apply a `/Rotate` value. Anything but a multiple of 90 is ignored.
    pub fn with_rotation(mut self, degrees: i64) -> Self {
        let normalized = degrees.rem_euclid(360);
        self.rotation = if normalized % 90 == 0 {
            normalized as u16
        } else {
            0
        };
        self
    }

    /// Width and height of the page as a viewer shows it.
    pub fn display_size(&self) -> (f32, f32) {
        match self.rotation {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }

    /// Matrix from the displayed page (origin at its lower-left corner)
    /// into default user space.
    pub fn display_to_user(&self) -> [f32; 6] {
        let (x, y, w, h) = (self.x, self.y, self.width, self.height);
        match self.rotation {
            90 => [0.0, 1.0, -1.0, 0.0, x + w, y],
            180 => [-1.0, 0.0, 0.0, -1.0, x + w, y + h],
            270 => [0.0, -1.0, 1.0, 0.0, x, y + h],
            _ => [1.0, 0.0, 0.0, 1.0, x, y],
        }
    }
}

/// `first` followed by `second`, in PDF row-vector order.
fn concat(first: [f32; 6], second: [f32; 6]) -> [f32; 6] {
    let [a1, b1, c1, d1, e1, f1] = first;
    let [a2, b2, c2, d2, e2, f2] = second;
    [
        a1 * a2 + b1 * c2,
        a1 * b2 + b1 * d2,
        c1 * a2 + d1 * c2,
        c1 * b2 + d1 * d2,
        e1 * a2 + f1 * c2 + e2,
        e1 * b2 + f1 * d2 + f2,
    ]
}

/// Everything a host needs to draw the watermark on one page.
#[derive(Debug)]
pub struct TextStamp<'a> {
    pub text: &'a str,
    pub font: &'a ResolvedFont,
    pub color: Color,
    pub opacity: f32,
    pub plan: PlacementPlan,
    /// Page MediaBox the plan was computed for.
    pub page: PageSize,
}

impl TextStamp<'_> {
    /// Absolute text matrices, one per draw, in default user space.
    pub fn text_matrices(&self) -> impl Iterator<Item = [f32; 6]> + '_ {
        let page = self.page.display_to_user();
        self.plan
            .instructions()
            .map(move |instruction| concat(text_matrix(&instruction, 0.0, 0.0), page))
    }
}

/// Page-level access to a PDF document.
pub trait PageHost {
    fn page_count(&self) -> usize;

    fn page_size(&self, index: usize) -> Result<PageSize, RenderError>;

    /// Draw the stamp on top of the page content. A failed call must leave
    /// the page's visible content unchanged.
    fn stamp_text(&mut self, index: usize, stamp: &TextStamp<'_>) -> Result<(), RenderError>;
}

/// Text matrix `[a b c d e f]` for one instruction.
///
/// Rotation is clockwise on the page about the instruction's rotation
/// center; the baseline origin is moved accordingly and offset by the
/// MediaBox origin.
pub fn text_matrix(instruction: &PlacementInstruction, origin_x: f32, origin_y: f32) -> [f32; 6] {
    // PDF user space is y-up, so a clockwise turn is a negative angle
    let phi = -instruction.rotation_degrees.to_radians();
    let (sin, cos) = phi.sin_cos();

    let vx = instruction.x - instruction.rotation_center_x;
    let vy = instruction.y - instruction.rotation_center_y;
    let ox = instruction.rotation_center_x + vx * cos - vy * sin;
    let oy = instruction.rotation_center_y + vx * sin + vy * cos;

    [cos, sin, -sin, cos, ox + origin_x, oy + origin_y]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRenderer {
    min_margin: f32,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_MARGIN_PT)
    }
}

impl PdfRenderer {
    pub fn new(min_margin: f32) -> Self {
        Self { min_margin }
    }

    /// Stamp every page, skipping pages that fail.
    pub fn render<H: PageHost + ?Sized>(
        &self,
        host: &mut H,
        config: &WatermarkConfig,
        font: &ResolvedFont,
    ) -> RenderReport {
        let mut report = RenderReport::default();
        let pages = host.page_count();

        if config.text().is_empty() {
            debug!(pages, "Empty watermark text, leaving PDF pages untouched");
            (0..pages).for_each(|_| report.skip());
            return report;
        }

        for index in 0..pages {
            let result = self.stamp_page(host, index, config, font);
            report.record("page", index, result);
        }

        info!(
            pages,
            stamped = report.stamped,
            failed = report.failed,
            font = font.family(),
            "Watermarked PDF pages"
        );
        report
    }

    fn stamp_page<H: PageHost + ?Sized>(
        &self,
        host: &mut H,
        index: usize,
        config: &WatermarkConfig,
        font: &ResolvedFont,
    ) -> Result<(), RenderError> {
        let page = host.page_size(index)?;
        let (width, height) = page.display_size();
        let canvas = Canvas::points(width, height);
        let plan = PlacementPlan::compute(config, &canvas, font, self.min_margin);

        let stamp = TextStamp {
            text: config.text(),
            font,
            color: config.color(),
            opacity: config.opacity(),
            plan,
            page,
        };
        host.stamp_text(index, &stamp)
    }
}
