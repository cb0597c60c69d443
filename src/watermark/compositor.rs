//! Overlay compositing.
//!
//! Sprites are stamped onto a transparent overlay the size of the target,
//! then the overlay is flattened onto the source image in one pass with the
//! Porter-Duff "over" operator. Overlapping tiles therefore accumulate
//! against each other, not against the source pixels.
//!
//! # Example
//!
//! ```ignore
//! use docmark::watermark::compositor::Compositor;
//!
//! let mut compositor = Compositor::new(image.width(), image.height());
//! compositor.stamp_centered(&sprite, 400.0, 300.0);
//! compositor.flatten_onto(&mut image);
//! ```

use image::{Rgba, RgbaImage};

/// Integer pixel position of a sprite's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelOffset {
    pub x: i32,
    pub y: i32,
}

impl PixelOffset {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Top-left offset that centers a `width x height` sprite on a point.
    pub fn centered(center_x: f32, center_y: f32, width: u32, height: u32) -> Self {
        Self::new(
            (center_x - width as f32 / 2.0).round() as i32,
            (center_y - height as f32 / 2.0).round() as i32,
        )
    }
}

/// Transparent overlay accumulating watermark stamps.
#[derive(Debug, Clone)]
pub struct Compositor {
    overlay: RgbaImage,
    stamps: usize,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            overlay: RgbaImage::new(width, height),
            stamps: 0,
        }
    }

    /// Blend `sprite` with its center on `(center_x, center_y)`.
    pub fn stamp_centered(&mut self, sprite: &RgbaImage, center_x: f32, center_y: f32) {
        let offset = PixelOffset::centered(center_x, center_y, sprite.width(), sprite.height());
        self.stamp(sprite, offset);
    }

    /// Blend `sprite` with its top-left corner at `offset`, clipped to the
    /// overlay. Sprites entirely outside are skipped.
    pub fn stamp(&mut self, sprite: &RgbaImage, offset: PixelOffset) {
        if is_visible(&self.overlay, sprite, offset) {
            blend_region(&mut self.overlay, sprite, offset, 1.0);
            self.stamps += 1;
        }
    }

    /// Number of stamps that touched the overlay.
    pub fn stamp_count(&self) -> usize {
        self.stamps
    }

    pub fn overlay(&self) -> &RgbaImage {
        &self.overlay
    }

    pub fn into_overlay(self) -> RgbaImage {
        self.overlay
    }

    /// Composite the overlay over `base`. Sizes must match; a mismatched
    /// base is blended over the common region only.
    pub fn flatten_onto(&self, base: &mut RgbaImage) {
        blend_region(base, &self.overlay, PixelOffset::new(0, 0), 1.0);
    }
}

fn is_visible(target: &RgbaImage, sprite: &RgbaImage, offset: PixelOffset) -> bool {
    let right = offset.x as i64 + sprite.width() as i64;
    let bottom = offset.y as i64 + sprite.height() as i64;
    right > 0
        && bottom > 0
        && (offset.x as i64) < target.width() as i64
        && (offset.y as i64) < target.height() as i64
}

/// Blend `layer` onto `target` at `offset`, clamped to the target bounds.
fn blend_region(target: &mut RgbaImage, layer: &RgbaImage, offset: PixelOffset, opacity: f32) {
    let target_width = target.width() as i64;
    let target_height = target.height() as i64;

    let x_start = (offset.x as i64).max(0);
    let y_start = (offset.y as i64).max(0);
    let x_end = (offset.x as i64 + layer.width() as i64).min(target_width);
    let y_end = (offset.y as i64 + layer.height() as i64).min(target_height);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let lx = (tx - offset.x as i64) as u32;
            let ly = (ty - offset.y as i64) as u32;

            let fg = *layer.get_pixel(lx, ly);
            if fg[3] == 0 {
                continue;
            }
            let bg = *target.get_pixel(tx as u32, ty as u32);
            target.put_pixel(tx as u32, ty as u32, blend_pixels(bg, fg, opacity));
        }
    }
}

/// Blend two pixels using alpha compositing with additional opacity.
///
/// Uses the "over" operator: result = foreground + background * (1 - foreground.alpha)
fn blend_pixels(background: Rgba<u8>, foreground: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let fg_alpha = (foreground[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = fg as f32 / 255.0;
        let bg_f = bg as f32 / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}
