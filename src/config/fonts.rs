//! Font lookup configuration.
//!
//! Resolution order is bundled file, then `fallback_families`, then
//! `logical_families`, then the built-in synthetic metrics.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::watermark::fonts::{
    DEFAULT_BUNDLED_FONT, DEFAULT_FALLBACK_FAMILIES, DEFAULT_LOGICAL_FAMILIES,
};

fn default_bundled_font() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_BUNDLED_FONT))
}

fn default_fallback_families() -> Vec<String> {
    DEFAULT_FALLBACK_FAMILIES.iter().map(|s| s.to_string()).collect()
}

fn default_logical_families() -> Vec<String> {
    DEFAULT_LOGICAL_FAMILIES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontConfig {
    /// Font file shipped alongside the binary
    #[serde(default = "default_bundled_font")]
    pub bundled_font: Option<PathBuf>,

    /// Installed families tried in order after the bundled font
    #[serde(default = "default_fallback_families")]
    pub fallback_families: Vec<String>,

    /// Generic families tried last
    #[serde(default = "default_logical_families")]
    pub logical_families: Vec<String>,

    /// Directories to scan instead of the platform defaults
    #[serde(default)]
    pub font_dirs: Vec<PathBuf>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            bundled_font: default_bundled_font(),
            fallback_families: default_fallback_families(),
            logical_families: default_logical_families(),
            font_dirs: Vec::new(),
        }
    }
}

impl FontConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = &self.bundled_font {
            if path.as_os_str().is_empty() {
                return Err("fonts.bundled_font cannot be an empty path".to_string());
            }
        }
        if let Some(empty) = self
            .fallback_families
            .iter()
            .chain(&self.logical_families)
            .find(|family| family.trim().is_empty())
        {
            return Err(format!("Font family names cannot be blank, got '{}'", empty));
        }
        Ok(())
    }
}
