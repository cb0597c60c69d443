//! Format dispatch and the request-level entry point.
//!
//! [`RendererKind::from_filename`] maps an extension to one of the four
//! renderers; [`Watermarker`] ties a shared font resolver and renderer
//! settings together and runs one file through decode, render and encode.
//!
//! # Example
//!
//! ```ignore
//! let watermarker = Watermarker::from_config(&config);
//! let config = WatermarkConfig::builder("DRAFT").build()?;
//! let output = watermarker.watermark("report.pdf", &bytes, &config)?;
//! std::fs::write(&output.file_name, &output.bytes)?;
//! ```

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::{Config, FontConfig, RendererSettings};
use crate::error::WatermarkError;
use crate::render::{RenderReport, Renderer};
use crate::watermark::{FontResolver, WatermarkConfig};

const OUTPUT_PREFIX: &str = "watermarked_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    Raster,
    Pdf,
    Spreadsheet,
    Document,
}

impl RendererKind {
    /// Case-insensitive extension lookup; `None` for anything unsupported.
    pub fn from_filename(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();

        match extension.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" => Some(Self::Raster),
            "pdf" => Some(Self::Pdf),
            "xlsx" => Some(Self::Spreadsheet),
            "docx" => Some(Self::Document),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raster => "raster",
            Self::Pdf => "pdf",
            Self::Spreadsheet => "spreadsheet",
            Self::Document => "document",
        }
    }

    /// `watermarked_<name>`; raster output is always PNG.
    pub fn output_file_name(&self, file_name: &str) -> String {
        let path = Path::new(file_name);
        let base = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());

        match self {
            Self::Raster => {
                let stem = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or(base);
                format!("{}{}.png", OUTPUT_PREFIX, stem)
            }
            _ => format!("{}{}", OUTPUT_PREFIX, base),
        }
    }
}

impl std::fmt::Display for RendererKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished output file.
#[derive(Debug, Clone)]
pub struct WatermarkedFile {
    pub file_name: String,
    pub kind: RendererKind,
    pub bytes: Vec<u8>,
    pub report: RenderReport,
}

/// Shared, thread-safe watermarking service.
///
/// Cloning is cheap; clones share one font cache.
#[derive(Clone)]
pub struct Watermarker {
    fonts: Arc<FontResolver>,
    settings: RendererSettings,
}

impl Watermarker {
    pub fn new(fonts: FontConfig, settings: RendererSettings) -> Self {
        Self {
            fonts: Arc::new(FontResolver::new(fonts)),
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.fonts.clone(), config.renderers)
    }

    pub fn fonts(&self) -> &FontResolver {
        &self.fonts
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Watermark one file. Nothing partial is returned on error.
    pub fn watermark(
        &self,
        file_name: &str,
        input: &[u8],
        config: &WatermarkConfig,
    ) -> Result<WatermarkedFile, WatermarkError> {
        let kind =
            RendererKind::from_filename(file_name).ok_or_else(|| WatermarkError::UnsupportedFormat {
                file_name: file_name.to_string(),
            })?;

        let started = Instant::now();
        let font = self.fonts.resolve(config.font_size() as f32);
        let rendered = Renderer::for_kind(kind, &self.settings).apply(input, config, &font)?;

        info!(
            file = file_name,
            kind = kind.as_str(),
            input_bytes = input.len(),
            output_bytes = rendered.bytes.len(),
            units = rendered.report.units,
            stamped = rendered.report.stamped,
            failed = rendered.report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Watermarked file"
        );

        Ok(WatermarkedFile {
            file_name: kind.output_file_name(file_name),
            kind,
            bytes: rendered.bytes,
            report: rendered.report,
        })
    }

    /// Read everything from `reader`, watermark it and write the result to
    /// `writer`. The writer is untouched when watermarking fails.
    pub fn watermark_stream<R: Read, W: Write>(
        &self,
        file_name: &str,
        mut reader: R,
        mut writer: W,
        config: &WatermarkConfig,
    ) -> Result<WatermarkedFile, WatermarkError> {
        let mut input = Vec::new();
        reader
            .read_to_end(&mut input)
            .map_err(|e| WatermarkError::decode("input", e.to_string()))?;

        let output = self.watermark(file_name, &input, config)?;
        writer
            .write_all(&output.bytes)
            .and_then(|_| writer.flush())
            .map_err(|e| WatermarkError::encode("output", e.to_string()))?;
        Ok(output)
    }
}
