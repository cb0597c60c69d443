//! Format codecs.
//!
//! Each adapter owns the decoded document model and exposes it to the
//! renderers through the host traits in [`crate::render`]. Whole-document
//! decode and encode failures surface as [`crate::error::WatermarkError`].

pub mod docx;
pub mod ooxml;
pub mod pdf;
pub mod raster;
pub mod xlsx;
