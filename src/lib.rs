// Docmark document watermarking library

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod render;
pub mod watermark;

pub use dispatch::{RendererKind, WatermarkedFile, Watermarker};
pub use error::{RenderError, WatermarkError};
pub use watermark::{WatermarkConfig, WatermarkPosition};
