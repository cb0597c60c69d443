//! Word-processor renderer.
//!
//! Documents reflow, so the watermark lives in the page headers as
//! background text shapes. This module only decides the shape parameters;
//! the [`HeaderHost`] writes the markup.

use tracing::{debug, info};

use super::RenderReport;
use crate::error::RenderError;
use crate::watermark::{Color, ResolvedFont, WatermarkConfig, WatermarkPosition};

pub const SINGLE_SHAPE_SIZE_PT: (f32, f32) = (500.0, 150.0);
pub const DIAGONAL_SHAPE_SIZE_PT: (f32, f32) = (200.0, 50.0);
pub const DIAGONAL_FONT_SCALE: f32 = 0.8;

/// `(left %, top %)` of each shape in a diagonal watermark, relative to
/// the page.
pub const DIAGONAL_GRID: [(u32, u32); 18] = [
    (15, 25),
    (35, 25),
    (55, 25),
    (75, 25),
    (5, 45),
    (25, 45),
    (45, 45),
    (65, 45),
    (85, 45),
    (15, 65),
    (35, 65),
    (55, 65),
    (75, 65),
    (5, 85),
    (25, 85),
    (45, 85),
    (65, 85),
    (85, 85),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

impl HorizontalAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
}

impl VerticalAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Center => "center",
            Self::Bottom => "bottom",
        }
    }
}

/// Where a shape sits on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapePlacement {
    /// Aligned inside the page margins.
    Aligned {
        horizontal: HorizontalAlign,
        vertical: VerticalAlign,
    },
    /// Offset from the page's top-left corner in whole percents.
    PagePercent { left: u32, top: u32 },
}

/// One background text shape in a page header.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundTextShape {
    pub text: String,
    pub font_family: String,
    pub font_size_pt: f32,
    pub color: Color,
    /// Fraction in `0.0..=1.0`.
    pub opacity: f32,
    /// Whole degrees, clockwise.
    pub rotation_degrees: i32,
    pub width_pt: f32,
    pub height_pt: f32,
    pub placement: ShapePlacement,
}

/// Header-level access to a word-processing document.
///
/// Each index is a distinct default page header. Hosts may create the
/// header on first use for sections that have none.
pub trait HeaderHost {
    fn header_count(&self) -> usize;

    fn add_background_text(
        &mut self,
        header: usize,
        shape: &BackgroundTextShape,
    ) -> Result<(), RenderError>;
}

fn alignment(position: WatermarkPosition) -> (HorizontalAlign, VerticalAlign) {
    match position {
        WatermarkPosition::TopLeft => (HorizontalAlign::Left, VerticalAlign::Top),
        WatermarkPosition::TopRight => (HorizontalAlign::Right, VerticalAlign::Top),
        WatermarkPosition::BottomLeft => (HorizontalAlign::Left, VerticalAlign::Bottom),
        WatermarkPosition::BottomRight => (HorizontalAlign::Right, VerticalAlign::Bottom),
        WatermarkPosition::Center | WatermarkPosition::Diagonal => {
            (HorizontalAlign::Center, VerticalAlign::Center)
        }
    }
}

/// Shapes making up the watermark for `config`.
pub fn shapes_for(config: &WatermarkConfig, font: &ResolvedFont) -> Vec<BackgroundTextShape> {
    let base = BackgroundTextShape {
        text: config.text().to_string(),
        font_family: font.family().to_string(),
        font_size_pt: config.font_size() as f32,
        color: config.color(),
        opacity: config.opacity(),
        rotation_degrees: config.rotation_degrees().trunc() as i32,
        width_pt: SINGLE_SHAPE_SIZE_PT.0,
        height_pt: SINGLE_SHAPE_SIZE_PT.1,
        placement: ShapePlacement::Aligned {
            horizontal: HorizontalAlign::Center,
            vertical: VerticalAlign::Center,
        },
    };

    if !config.is_tiled() {
        let (horizontal, vertical) = alignment(config.position());
        return vec![BackgroundTextShape {
            placement: ShapePlacement::Aligned {
                horizontal,
                vertical,
            },
            ..base
        }];
    }

    DIAGONAL_GRID
        .iter()
        .map(|&(left, top)| BackgroundTextShape {
            font_size_pt: base.font_size_pt * DIAGONAL_FONT_SCALE,
            width_pt: DIAGONAL_SHAPE_SIZE_PT.0,
            height_pt: DIAGONAL_SHAPE_SIZE_PT.1,
            placement: ShapePlacement::PagePercent { left, top },
            ..base.clone()
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentRenderer;

impl DocumentRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render<H: HeaderHost + ?Sized>(
        &self,
        host: &mut H,
        config: &WatermarkConfig,
        font: &ResolvedFont,
    ) -> RenderReport {
        let mut report = RenderReport::default();
        let headers = host.header_count();

        if config.text().is_empty() {
            debug!(headers, "Empty watermark text, leaving headers untouched");
            (0..headers).for_each(|_| report.skip());
            return report;
        }

        let shapes = shapes_for(config, font);
        for header in 0..headers {
            for (index, shape) in shapes.iter().enumerate() {
                let result = host.add_background_text(header, shape);
                if result.is_err() {
                    debug!(header, shape = index, "Header shape rejected");
                }
                report.record("header shape", index, result);
            }
        }

        info!(
            headers,
            shapes = shapes.len(),
            stamped = report.stamped,
            failed = report.failed,
            font = font.family(),
            "Watermarked document headers"
        );
        report
    }
}
