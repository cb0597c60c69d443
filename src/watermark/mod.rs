//! Format-independent watermark machinery.
//!
//! Everything a renderer needs before it touches a concrete document:
//! the validated configuration, font resolution and metrics, the placement
//! geometry, and the raster sprite/compositing helpers.
//!
//! # Features
//!
//! - **Six positions**: center, four corners, and full-surface diagonal tiling
//! - **Coordinate conventions**: top-left pixel canvases and bottom-left
//!   point canvases share one geometry engine
//! - **Font fallback chain** with a metrics-only last resort
//!
//! # Configuration Example
//!
//! ```yaml
//! watermark:
//!   text: "CONFIDENTIAL"
//!   opacity: 0.3
//!   font_size: 40
//!   color: "#808080"
//!   rotation_degrees: 45
//!   position: diagonal
//! ```

pub mod compositor;
pub mod config;
pub mod fonts;
pub mod position;
pub mod text_renderer;

// Re-export main types for convenience
pub use compositor::{Compositor, PixelOffset};
pub use config::{WatermarkConfig, WatermarkConfigBuilder, WatermarkPosition};
pub use fonts::{FontLoadError, FontMetrics, FontResolver, FontSource, ResolvedFont};
pub use position::{
    calculate_anchor, Canvas, Margins, Origin, PlacementInstruction, PlacementPlan, TextExtent,
    TileGrid, Unit,
};
pub use text_renderer::{parse_hex_color, render_text, rotate_image, Color, TextRenderOptions};
