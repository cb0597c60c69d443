//! Text sprite rendering.
//!
//! The watermark text is rasterized once per request into a transparent
//! sprite, rotated once, and then stamped at every placement by the
//! compositor.
//!
//! # Features
//!
//! - Hex color parsing (#RGB and #RRGGBB formats)
//! - Opacity baked into the sprite alpha (coverage x opacity)
//! - Bilinear rotation, positive angles clockwise on screen
//!
//! # Example
//!
//! ```ignore
//! use docmark::watermark::text_renderer::{parse_hex_color, render_text, TextRenderOptions};
//!
//! let options = TextRenderOptions {
//!     text: "CONFIDENTIAL".to_string(),
//!     color: parse_hex_color("#808080")?,
//!     opacity: 0.3,
//!     rotation_degrees: 45.0,
//! };
//! let sprite = render_text(&font, &options);
//! ```

use ab_glyph::{point, Font, GlyphId, ScaleFont};
use image::{Rgba, RgbaImage};

use super::fonts::{FontMetrics, ResolvedFont};
use crate::error::WatermarkError;

/// Transparent border around the sprite so bilinear rotation does not clip
/// edge pixels.
const SPRITE_PADDING: u32 = 2;

/// RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#RRGGBB`, upper case.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Components scaled to `[0, 1]`, as PDF color operators expect.
    pub fn to_unit_rgb(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

/// Parse a hex color string into RGB components.
///
/// Supports both #RGB and #RRGGBB formats.
///
/// # Examples
///
/// ```ignore
/// let white = parse_hex_color("#FFF").unwrap();
/// assert_eq!(white, Color::new(255, 255, 255));
///
/// let red = parse_hex_color("#FF0000").unwrap();
/// assert_eq!(red, Color::new(255, 0, 0));
/// ```
pub fn parse_hex_color(hex: &str) -> Result<Color, WatermarkError> {
    let digits = hex.strip_prefix('#').ok_or_else(|| {
        WatermarkError::Config(format!(
            "Color must be a hex string starting with '#', got '{}'",
            hex
        ))
    })?;

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WatermarkError::Config(format!(
            "Color contains invalid hex digits: '{}'",
            hex
        )));
    }

    let component = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map_err(|_| WatermarkError::Config(format!("Invalid hex digit in '{}'", hex)))
    };

    match digits.len() {
        // Double each digit: 0xF -> 0xFF, 0xA -> 0xAA
        3 => Ok(Color::new(
            component(0..1)? * 17,
            component(1..2)? * 17,
            component(2..3)? * 17,
        )),
        6 => Ok(Color::new(
            component(0..2)?,
            component(2..4)?,
            component(4..6)?,
        )),
        len => Err(WatermarkError::Config(format!(
            "Color must be #RGB or #RRGGBB format, got {} characters",
            len
        ))),
    }
}

/// Options for rendering the watermark sprite.
#[derive(Debug, Clone)]
pub struct TextRenderOptions {
    pub text: String,
    pub color: Color,
    /// Opacity (0.0 to 1.0).
    pub opacity: f32,
    /// Clockwise rotation in degrees; 0 skips the rotation pass.
    pub rotation_degrees: f32,
}

/// Rasterize the text into a sprite centered on its text box.
///
/// The text box spans one line height above the baseline, matching
/// placement instructions. The sprite's center is the text box center, so
/// callers place it by centering it on an instruction's rotation center and
/// the baseline lands on the instruction's `y`. Descenders hang into extra
/// room below the box, mirrored above to keep the center. Returns `None`
/// when there is nothing to draw: empty text or a face without outlines.
pub fn render_text(font: &ResolvedFont, options: &TextRenderOptions) -> Option<RgbaImage> {
    if options.text.is_empty() {
        return None;
    }
    let face = font.font()?;

    let scale = font.px_scale();
    let scaled = face.as_scaled(scale);

    let text_width = font.text_width(&options.text).ceil().max(1.0) as u32;
    let line_height = font.line_height().ceil().max(1.0) as u32;
    let below = (-scaled.descent()).ceil().max(0.0) as u32;
    let top = SPRITE_PADDING + below;
    let width = text_width + SPRITE_PADDING * 2;
    let height = line_height + top * 2;

    let mut sprite = RgbaImage::new(width, height);
    let alpha = options.opacity.clamp(0.0, 1.0) * 255.0;
    let baseline_y = (top + line_height) as f32;

    let mut cursor_x = SPRITE_PADDING as f32;
    let mut prev_glyph: Option<GlyphId> = None;

    for c in options.text.chars() {
        let glyph_id = scaled.glyph_id(c);

        if let Some(prev) = prev_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }

        let glyph = glyph_id.with_scale_and_position(scale, point(cursor_x, baseline_y));

        if let Some(outlined) = face.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();

            outlined.draw(|px, py, coverage| {
                let x = px as i32 + bounds.min.x as i32;
                let y = py as i32 + bounds.min.y as i32;

                if x >= 0 && y >= 0 && x < width as i32 && y < height as i32 {
                    let pixel = Rgba([
                        options.color.r,
                        options.color.g,
                        options.color.b,
                        (coverage.clamp(0.0, 1.0) * alpha) as u8,
                    ]);
                    let existing = sprite.get_pixel(x as u32, y as u32);
                    let blended = blend_pixels(*existing, pixel);
                    sprite.put_pixel(x as u32, y as u32, blended);
                }
            });
        }

        cursor_x += scaled.h_advance(glyph_id);
        prev_glyph = Some(glyph_id);
    }

    if options.rotation_degrees != 0.0 {
        sprite = rotate_image(&sprite, options.rotation_degrees);
    }

    Some(sprite)
}

/// Blend two RGBA pixels using alpha compositing.
fn blend_pixels(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let top_alpha = top[3] as f32 / 255.0;
    let bottom_alpha = bottom[3] as f32 / 255.0;

    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let result = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (result * 255.0).round() as u8
    };

    Rgba([
        blend(top[0], bottom[0]),
        blend(top[1], bottom[1]),
        blend(top[2], bottom[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Rotate an image about its center, clockwise on screen for positive
/// angles. The result is grown to the rotated bounding box and keeps the
/// same center.
pub fn rotate_image(image: &RgbaImage, degrees: f32) -> RgbaImage {
    // y grows downward, so a positive angle in this basis turns clockwise
    let radians = degrees.to_radians();
    let cos = radians.cos();
    let sin = radians.sin();

    let src_w = image.width() as f32;
    let src_h = image.height() as f32;
    let cx = src_w / 2.0;
    let cy = src_h / 2.0;

    let rotated_corners = [
        (-cx, -cy),
        (src_w - cx, -cy),
        (-cx, src_h - cy),
        (src_w - cx, src_h - cy),
    ]
    .map(|(x, y)| (x * cos - y * sin, x * sin + y * cos));

    let (mut min_x, mut max_x) = (f32::INFINITY, f32::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f32::INFINITY, f32::NEG_INFINITY);
    for (x, y) in rotated_corners {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    let dst_w = ((max_x - min_x).ceil() as u32).max(1);
    let dst_h = ((max_y - min_y).ceil() as u32).max(1);
    let mut rotated = RgbaImage::new(dst_w, dst_h);

    let dst_cx = dst_w as f32 / 2.0;
    let dst_cy = dst_h as f32 / 2.0;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            // Inverse rotation from destination back into the source
            let rx = dx as f32 + 0.5 - dst_cx;
            let ry = dy as f32 + 0.5 - dst_cy;

            let sx = rx * cos + ry * sin + cx - 0.5;
            let sy = -rx * sin + ry * cos + cy - 0.5;

            if sx >= 0.0 && sx < src_w - 1.0 && sy >= 0.0 && sy < src_h - 1.0 {
                let x0 = sx.floor() as u32;
                let y0 = sy.floor() as u32;
                let fx = sx - x0 as f32;
                let fy = sy - y0 as f32;

                let p00 = image.get_pixel(x0, y0);
                let p10 = image.get_pixel(x0 + 1, y0);
                let p01 = image.get_pixel(x0, y0 + 1);
                let p11 = image.get_pixel(x0 + 1, y0 + 1);

                let interpolate = |c: usize| -> u8 {
                    let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
                        + p10[c] as f32 * fx * (1.0 - fy)
                        + p01[c] as f32 * (1.0 - fx) * fy
                        + p11[c] as f32 * fx * fy;
                    v.round().clamp(0.0, 255.0) as u8
                };

                rotated.put_pixel(
                    dx,
                    dy,
                    Rgba([interpolate(0), interpolate(1), interpolate(2), interpolate(3)]),
                );
            }
        }
    }

    rotated
}
