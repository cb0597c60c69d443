//! Per-format renderers.
//!
//! The format set is closed: [`Renderer`] is an enum over the four
//! renderers, selected by [`RendererKind`]. Each renderer turns a
//! [`WatermarkConfig`] plus a resolved font into edits on its host model,
//! isolating failures per page, sheet or header.

pub mod document;
pub mod pdf;
pub mod raster;
pub mod spreadsheet;

use tracing::warn;

use crate::codec::docx::DocxDocument;
use crate::codec::pdf::LopdfDocument;
use crate::codec::xlsx::XlsxWorkbook;
use crate::config::RendererSettings;
use crate::dispatch::RendererKind;
use crate::error::{RenderError, WatermarkError};
use crate::watermark::{ResolvedFont, WatermarkConfig};

pub use document::{BackgroundTextShape, DocumentRenderer, HeaderHost};
pub use pdf::{PageHost, PageSize, PdfRenderer, TextStamp};
pub use raster::RasterRenderer;
pub use spreadsheet::{CellRange, SheetHost, SheetLayout, SpreadsheetRenderer};

/// Outcome of one render pass over a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Pages, sheets, headers or images visited.
    pub units: usize,
    /// Units that received a watermark.
    pub stamped: usize,
    /// Units skipped because of an error.
    pub failed: usize,
}

impl RenderReport {
    /// Count one unit, logging and swallowing its error.
    pub fn record(&mut self, unit: &'static str, index: usize, result: Result<(), RenderError>) {
        self.units += 1;
        match result {
            Ok(()) => self.stamped += 1,
            Err(e) => {
                self.failed += 1;
                warn!(unit, index, error = %e, "Failed to watermark unit, skipping");
            }
        }
    }

    /// Count one unit that was intentionally left untouched.
    pub fn skip(&mut self) {
        self.units += 1;
    }
}

/// Watermarked bytes plus what happened while producing them.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub report: RenderReport,
}

/// One renderer per supported format family.
#[derive(Debug, Clone)]
pub enum Renderer {
    Raster(RasterRenderer),
    Pdf(PdfRenderer),
    Spreadsheet(SpreadsheetRenderer),
    Document(DocumentRenderer),
}

impl Renderer {
    pub fn for_kind(kind: RendererKind, settings: &RendererSettings) -> Self {
        match kind {
            RendererKind::Raster => Self::Raster(RasterRenderer::new(settings.raster_min_margin)),
            RendererKind::Pdf => Self::Pdf(PdfRenderer::new(settings.pdf_min_margin)),
            RendererKind::Spreadsheet => Self::Spreadsheet(SpreadsheetRenderer::new(
                RasterRenderer::new(settings.spreadsheet_min_margin),
            )),
            RendererKind::Document => Self::Document(DocumentRenderer::new()),
        }
    }

    pub fn kind(&self) -> RendererKind {
        match self {
            Self::Raster(_) => RendererKind::Raster,
            Self::Pdf(_) => RendererKind::Pdf,
            Self::Spreadsheet(_) => RendererKind::Spreadsheet,
            Self::Document(_) => RendererKind::Document,
        }
    }

    /// Decode `input`, watermark it and re-encode it in the output format.
    pub fn apply(
        &self,
        input: &[u8],
        config: &WatermarkConfig,
        font: &ResolvedFont,
    ) -> Result<Rendered, WatermarkError> {
        match self {
            Self::Raster(renderer) => renderer.watermark_bytes(input, config, font),
            Self::Pdf(renderer) => {
                let mut document = LopdfDocument::from_bytes(input)?;
                let report = renderer.render(&mut document, config, font);
                let bytes = document.to_bytes()?;
                Ok(Rendered { bytes, report })
            }
            Self::Spreadsheet(renderer) => {
                let mut workbook = XlsxWorkbook::from_bytes(input)?;
                let report = renderer.render(&mut workbook, config, font);
                let bytes = workbook.to_bytes()?;
                Ok(Rendered { bytes, report })
            }
            Self::Document(renderer) => {
                let mut document = DocxDocument::from_bytes(input)?;
                let report = renderer.render(&mut document, config, font);
                let bytes = document.to_bytes()?;
                Ok(Rendered { bytes, report })
            }
        }
    }
}
