//! Watermark defaults as read from YAML.
//!
//! Everything here is loosely typed (position and color are strings) so a
//! config file can use any accepted spelling. [`WatermarkSettings::to_config`]
//! turns the settings into a validated [`WatermarkConfig`].

use serde::{Deserialize, Serialize};

use crate::error::WatermarkError;
use crate::watermark::config::{
    DEFAULT_COLOR, DEFAULT_FONT_SIZE, DEFAULT_OPACITY, DEFAULT_ROTATION_DEGREES,
};
use crate::watermark::{parse_hex_color, WatermarkConfig, WatermarkPosition};

pub const DEFAULT_TEXT: &str = "CONFIDENTIAL";

fn default_text() -> String {
    DEFAULT_TEXT.to_string()
}

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn default_color() -> String {
    DEFAULT_COLOR.to_hex()
}

fn default_rotation() -> f32 {
    DEFAULT_ROTATION_DEGREES
}

fn default_position() -> String {
    WatermarkPosition::default().as_str().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkSettings {
    #[serde(default = "default_text")]
    pub text: String,

    /// 0.0 (invisible) to 1.0 (opaque)
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// `#RGB` or `#RRGGBB`
    #[serde(default = "default_color")]
    pub color: String,

    /// Clockwise, in degrees
    #[serde(default = "default_rotation")]
    pub rotation_degrees: f32,

    /// `center`, `top-left`, `TOP_LEFT`, ... Unknown values mean center.
    #[serde(default = "default_position")]
    pub position: String,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            text: default_text(),
            opacity: default_opacity(),
            font_size: default_font_size(),
            color: default_color(),
            rotation_degrees: default_rotation(),
            position: default_position(),
        }
    }
}

impl WatermarkSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(format!(
                "Watermark opacity must be a finite value between 0.0 and 1.0, got {}",
                self.opacity
            ));
        }
        if self.font_size == 0 {
            return Err("Watermark font_size must be greater than 0".to_string());
        }
        if !self.rotation_degrees.is_finite() {
            return Err("Watermark rotation_degrees must be finite".to_string());
        }
        parse_hex_color(&self.color).map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn to_config(&self) -> Result<WatermarkConfig, WatermarkError> {
        WatermarkConfig::builder(self.text.as_str())
            .opacity(self.opacity)
            .font_size(self.font_size)
            .color(parse_hex_color(&self.color)?)
            .rotation_degrees(self.rotation_degrees)
            .position(WatermarkPosition::parse_lenient(&self.position))
            .build()
    }
}
