//! Per-format renderer settings.

use serde::{Deserialize, Serialize};

use crate::render::pdf::DEFAULT_MIN_MARGIN_PT;
use crate::render::raster::DEFAULT_MIN_MARGIN_PX;

fn default_raster_margin() -> f32 {
    DEFAULT_MIN_MARGIN_PX
}

fn default_pdf_margin() -> f32 {
    DEFAULT_MIN_MARGIN_PT
}

/// Minimum margins used by the geometry engine, in each format's unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RendererSettings {
    /// Pixels
    #[serde(default = "default_raster_margin")]
    pub raster_min_margin: f32,

    /// Points
    #[serde(default = "default_pdf_margin")]
    pub pdf_min_margin: f32,

    /// Pixels of the synthesized sheet canvas
    #[serde(default = "default_raster_margin")]
    pub spreadsheet_min_margin: f32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            raster_min_margin: default_raster_margin(),
            pdf_min_margin: default_pdf_margin(),
            spreadsheet_min_margin: default_raster_margin(),
        }
    }
}

impl RendererSettings {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("raster_min_margin", self.raster_min_margin),
            ("pdf_min_margin", self.pdf_min_margin),
            ("spreadsheet_min_margin", self.spreadsheet_min_margin),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!(
                    "renderers.{} must be a finite, non-negative value, got {}",
                    name, value
                ));
            }
        }
        Ok(())
    }
}
