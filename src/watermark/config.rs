//! Watermark configuration value object.
//!
//! A [`WatermarkConfig`] is built once per request through
//! [`WatermarkConfig::builder`] and is immutable afterwards. The builder
//! validates every field, so renderers can rely on finite, in-range values.
//!
//! # Example
//!
//! ```ignore
//! use docmark::watermark::config::{WatermarkConfig, WatermarkPosition};
//!
//! let config = WatermarkConfig::builder("CONFIDENTIAL")
//!     .opacity(0.3)
//!     .position(WatermarkPosition::Diagonal)
//!     .build()?;
//! assert!(config.is_tiled());
//! ```

use std::fmt;
use std::str::FromStr;

use super::text_renderer::Color;
use crate::error::WatermarkError;

pub const DEFAULT_OPACITY: f32 = 0.3;
pub const DEFAULT_FONT_SIZE: u32 = 40;
pub const DEFAULT_ROTATION_DEGREES: f32 = 45.0;
pub const DEFAULT_COLOR: Color = Color::new(128, 128, 128);

/// Where the watermark is anchored.
///
/// `Diagonal` tiles the text over the whole surface; every other variant
/// places a single instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WatermarkPosition {
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    #[default]
    Diagonal,
}

impl WatermarkPosition {
    pub const ALL: [WatermarkPosition; 6] = [
        Self::Center,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
        Self::Diagonal,
    ];

    /// Canonical kebab-case name, as accepted in YAML and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::Diagonal => "diagonal",
        }
    }

    /// Parse a position name, falling back to `Center` for unknown input.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(
                position = value,
                "Unrecognized watermark position, falling back to center"
            );
            Self::Center
        })
    }

    pub fn is_tiled(&self) -> bool {
        matches!(self, Self::Diagonal)
    }
}

impl fmt::Display for WatermarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatermarkPosition {
    type Err = WatermarkError;

    /// Accepts `top-left`, `TOP_LEFT` and `top_left` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|position| position.as_str() == normalized)
            .ok_or_else(|| WatermarkError::Config(format!("Unknown watermark position '{}'", s)))
    }
}

/// Immutable watermark parameters for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkConfig {
    text: String,
    opacity: f32,
    font_size: u32,
    color: Color,
    rotation_degrees: f32,
    position: WatermarkPosition,
}

impl WatermarkConfig {
    pub fn builder(text: impl Into<String>) -> WatermarkConfigBuilder {
        WatermarkConfigBuilder::new(text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Opacity in `[0, 1]`.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Em size; pixels for raster output, points for PDF and DOCX.
    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Clockwise rotation as seen on the rendered page.
    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    pub fn position(&self) -> WatermarkPosition {
        self.position
    }

    pub fn is_tiled(&self) -> bool {
        self.position.is_tiled()
    }
}

/// Builder for [`WatermarkConfig`].
#[derive(Debug, Clone)]
pub struct WatermarkConfigBuilder {
    text: String,
    opacity: f32,
    font_size: u32,
    color: Color,
    rotation_degrees: f32,
    position: WatermarkPosition,
}

impl WatermarkConfigBuilder {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            opacity: DEFAULT_OPACITY,
            font_size: DEFAULT_FONT_SIZE,
            color: DEFAULT_COLOR,
            rotation_degrees: DEFAULT_ROTATION_DEGREES,
            position: WatermarkPosition::default(),
        }
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn font_size(mut self, font_size: u32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn rotation_degrees(mut self, degrees: f32) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn position(mut self, position: WatermarkPosition) -> Self {
        self.position = position;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<WatermarkConfig, WatermarkError> {
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(WatermarkError::Config(format!(
                "Watermark opacity must be a finite value between 0.0 and 1.0, got {}",
                self.opacity
            )));
        }

        if self.font_size == 0 {
            return Err(WatermarkError::Config(
                "Watermark font size must be greater than zero".to_string(),
            ));
        }

        if !self.rotation_degrees.is_finite() {
            return Err(WatermarkError::Config(format!(
                "Watermark rotation must be finite, got {}",
                self.rotation_degrees
            )));
        }

        Ok(WatermarkConfig {
            text: self.text,
            opacity: self.opacity,
            font_size: self.font_size,
            color: self.color,
            rotation_degrees: self.rotation_degrees,
            position: self.position,
        })
    }
}
