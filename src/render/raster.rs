//! Raster image renderer.
//!
//! Top-left origin, pixel units. The text is rasterized and rotated once,
//! stamped at every instruction's rotation center on a transparent overlay,
//! and the overlay is flattened over the source. Output is always PNG so
//! the source alpha channel survives.

use image::RgbaImage;
use tracing::debug;

use super::{RenderReport, Rendered};
use crate::codec::raster::{decode_image, encode_png};
use crate::error::WatermarkError;
use crate::watermark::{
    render_text, Canvas, Compositor, Margins, PlacementPlan, ResolvedFont, TextExtent,
    TextRenderOptions, WatermarkConfig, WatermarkPosition,
};

pub const DEFAULT_MIN_MARGIN_PX: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterRenderer {
    min_margin: f32,
}

impl Default for RasterRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_MARGIN_PX)
    }
}

impl RasterRenderer {
    pub fn new(min_margin: f32) -> Self {
        Self { min_margin }
    }

    /// Watermark `image` in place.
    pub fn render(
        &self,
        image: &mut RgbaImage,
        config: &WatermarkConfig,
        font: &ResolvedFont,
    ) -> RenderReport {
        let mut report = RenderReport::default();
        let overlay = self.overlay(image.width(), image.height(), config, font, config.position());

        if overlay.stamp_count() == 0 {
            report.skip();
        } else {
            overlay.flatten_onto(image);
            report.record("image", 0, Ok(()));
        }
        report
    }

    /// Transparent `width x height` canvas carrying a tiled watermark,
    /// regardless of the configured position.
    pub fn tiled_overlay(
        &self,
        width: u32,
        height: u32,
        config: &WatermarkConfig,
        font: &ResolvedFont,
    ) -> RgbaImage {
        self.overlay(width, height, config, font, WatermarkPosition::Diagonal)
            .into_overlay()
    }

    /// Decode, watermark and re-encode as PNG.
    pub fn watermark_bytes(
        &self,
        input: &[u8],
        config: &WatermarkConfig,
        font: &ResolvedFont,
    ) -> Result<Rendered, WatermarkError> {
        let mut image = decode_image(input)?.to_rgba8();
        let report = self.render(&mut image, config, font);
        let bytes = encode_png(&image)?;
        Ok(Rendered { bytes, report })
    }

    fn overlay(
        &self,
        width: u32,
        height: u32,
        config: &WatermarkConfig,
        font: &ResolvedFont,
        position: WatermarkPosition,
    ) -> Compositor {
        let mut compositor = Compositor::new(width, height);
        if width == 0 || height == 0 {
            return compositor;
        }

        let options = TextRenderOptions {
            text: config.text().to_string(),
            color: config.color(),
            opacity: config.opacity(),
            rotation_degrees: config.rotation_degrees(),
        };
        let Some(sprite) = render_text(font, &options) else {
            debug!(
                family = font.family(),
                "Nothing to draw for watermark text, leaving image untouched"
            );
            return compositor;
        };

        let canvas = Canvas::pixels(width, height);
        let margins = Margins::for_canvas(&canvas, self.min_margin);
        let extent = TextExtent::measure(font, config.text());
        let plan = PlacementPlan::new(
            position,
            config.rotation_degrees(),
            &canvas,
            extent,
            margins,
        );

        for instruction in plan.instructions() {
            compositor.stamp_centered(
                &sprite,
                instruction.rotation_center_x,
                instruction.rotation_center_y,
            );
        }

        debug!(
            width,
            height,
            placements = plan.len(),
            stamped = compositor.stamp_count(),
            "Composited raster watermark"
        );
        compositor
    }
}
