//! Spreadsheet renderer.
//!
//! Sheets have no fixed page size, so each sheet gets a synthesized pixel
//! canvas covering its used range. A tiled watermark is rasterized onto a
//! transparent canvas of that size and handed to the [`SheetHost`] as a
//! PNG floating over a range of cells.

use tracing::{debug, info};

use super::raster::RasterRenderer;
use super::RenderReport;
use crate::codec::raster::encode_png;
use crate::error::RenderError;
use crate::watermark::{ResolvedFont, WatermarkConfig, WatermarkPosition};

pub const MIN_CANVAS_WIDTH_PX: u32 = 800;
pub const MIN_CANVAS_HEIGHT_PX: u32 = 600;
pub const CANVAS_PADDING_PX: f32 = 50.0;
/// Largest raster side; the two-cell anchor stretches it over the range.
pub const MAX_CANVAS_SIDE_PX: u32 = 8192;

/// Pixel size of each used column and row of a sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetLayout {
    /// Columns `A..` up to the last used one.
    pub column_widths: Vec<f32>,
    /// Rows `1..` up to the last used one.
    pub row_heights: Vec<f32>,
}

impl SheetLayout {
    pub fn used_columns(&self) -> usize {
        self.column_widths.len()
    }

    /// 0-based index of the last used row (0 for an empty sheet).
    pub fn last_row(&self) -> usize {
        self.row_heights.len().saturating_sub(1)
    }

    /// Canvas covering the used range, never smaller than 800x600 and
    /// never larger than [`MAX_CANVAS_SIDE_PX`] on either side.
    pub fn canvas_size(&self) -> (u32, u32) {
        let width: f32 = self.column_widths.iter().sum();
        let height: f32 = self.row_heights.iter().sum::<f32>() + CANVAS_PADDING_PX;
        (
            (width.round() as u32).clamp(MIN_CANVAS_WIDTH_PX, MAX_CANVAS_SIDE_PX),
            (height.round() as u32).clamp(MIN_CANVAS_HEIGHT_PX, MAX_CANVAS_SIDE_PX),
        )
    }
}

/// Two-cell anchor, 0-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub first_col: usize,
    pub first_row: usize,
    pub last_col: usize,
    pub last_row: usize,
}

impl CellRange {
    /// Cells the picture is anchored to for `position`.
    ///
    /// `last_col` is the used column count and `last_row` the last used
    /// row index.
    pub fn for_position(position: WatermarkPosition, last_col: usize, last_row: usize) -> Self {
        let left = (0, last_col.min(5));
        let right = (last_col.saturating_sub(5), last_col);
        let top = (0, last_row.min(8));
        let bottom = (last_row.saturating_sub(8), last_row);

        let ((first_col, last_col), (first_row, last_row)) = match position {
            WatermarkPosition::TopLeft => (left, top),
            WatermarkPosition::TopRight => (right, top),
            WatermarkPosition::BottomLeft => (left, bottom),
            WatermarkPosition::BottomRight => (right, bottom),
            WatermarkPosition::Center => {
                let c = last_col / 2;
                let r = last_row / 2;
                (
                    (c.saturating_sub(3), last_col.min(c + 3)),
                    (r.saturating_sub(4), last_row.min(r + 4)),
                )
            }
            WatermarkPosition::Diagonal => ((0, last_col), (0, last_row + 1)),
        };

        Self {
            first_col,
            first_row,
            last_col,
            last_row,
        }
    }
}

/// Sheet-level access to a workbook.
pub trait SheetHost {
    fn sheet_count(&self) -> usize;

    fn sheet_layout(&self, index: usize) -> Result<SheetLayout, RenderError>;

    /// Float a PNG of `width x height` pixels over `range`.
    fn embed_picture(
        &mut self,
        index: usize,
        png: &[u8],
        size: (u32, u32),
        range: CellRange,
    ) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpreadsheetRenderer {
    raster: RasterRenderer,
}

impl SpreadsheetRenderer {
    pub fn new(raster: RasterRenderer) -> Self {
        Self { raster }
    }

    pub fn render<H: SheetHost + ?Sized>(
        &self,
        host: &mut H,
        config: &WatermarkConfig,
        font: &ResolvedFont,
    ) -> RenderReport {
        let mut report = RenderReport::default();
        let sheets = host.sheet_count();

        if config.text().is_empty() {
            debug!(sheets, "Empty watermark text, leaving sheets untouched");
            (0..sheets).for_each(|_| report.skip());
            return report;
        }

        for index in 0..sheets {
            match self.stamp_sheet(host, index, config, font) {
                Ok(true) => report.record("sheet", index, Ok(())),
                Ok(false) => report.skip(),
                Err(e) => report.record("sheet", index, Err(e)),
            }
        }

        info!(
            sheets,
            stamped = report.stamped,
            failed = report.failed,
            "Watermarked spreadsheet"
        );
        report
    }

    /// Returns whether anything was embedded.
    fn stamp_sheet<H: SheetHost + ?Sized>(
        &self,
        host: &mut H,
        index: usize,
        config: &WatermarkConfig,
        font: &ResolvedFont,
    ) -> Result<bool, RenderError> {
        let layout = host.sheet_layout(index)?;
        let (width, height) = layout.canvas_size();

        let overlay = self.raster.tiled_overlay(width, height, config, font);
        if overlay.pixels().all(|pixel| pixel[3] == 0) {
            debug!(sheet = index, "Watermark overlay is blank, skipping sheet");
            return Ok(false);
        }

        let png = encode_png(&overlay).map_err(|e| RenderError::Image(e.to_string()))?;
        let range =
            CellRange::for_position(config.position(), layout.used_columns(), layout.last_row());

        debug!(sheet = index, width, height, ?range, "Embedding watermark picture");
        host.embed_picture(index, &png, (width, height), range)?;
        Ok(true)
    }
}
