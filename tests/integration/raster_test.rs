// Raster watermarking through the public API

use std::io::Cursor;

use docmark::codec::raster::decode_image;
use docmark::render::RasterRenderer;
use docmark::watermark::{FontSource, ResolvedFont};
use docmark::{RendererKind, WatermarkConfig, WatermarkPosition};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, Rgba};

use super::fixtures;

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([240, 240, 240]));
    let mut output = Cursor::new(Vec::new());
    JpegEncoder::new(&mut output).encode_image(&image).unwrap();
    output.into_inner()
}

#[test]
fn test_dimensions_are_preserved() {
    let config = WatermarkConfig::builder("SAMPLE").build().unwrap();
    let input = fixtures::png(320, 200, [255, 255, 255, 255]);
    let rendered = RasterRenderer::default()
        .watermark_bytes(&input, &config, &ResolvedFont::synthetic(24.0))
        .unwrap();

    let output = decode_image(&rendered.bytes).unwrap();
    assert_eq!((output.width(), output.height()), (320, 200));
}

// Test: a synthetic font draws nothing and leaves every pixel alone
#[test]
fn test_synthetic_font_leaves_pixels_untouched() {
    let config = WatermarkConfig::builder("SAMPLE").build().unwrap();
    let input = fixtures::png(64, 48, [10, 20, 30, 255]);
    let rendered = RasterRenderer::default()
        .watermark_bytes(&input, &config, &ResolvedFont::synthetic(24.0))
        .unwrap();

    assert_eq!(rendered.report.stamped, 0);
    let output = decode_image(&rendered.bytes).unwrap().to_rgba8();
    assert!(output.pixels().all(|pixel| *pixel == Rgba([10, 20, 30, 255])));
}

#[test]
fn test_jpeg_input_becomes_png_output() {
    let watermarker = fixtures::system_watermarker();
    let config = WatermarkConfig::builder("SAMPLE")
        .position(WatermarkPosition::Diagonal)
        .build()
        .unwrap();

    let output = watermarker
        .watermark("holiday.JPG", &jpeg(200, 120), &config)
        .unwrap();
    assert_eq!(output.kind, RendererKind::Raster);
    assert_eq!(output.file_name, "watermarked_holiday.png");
    assert_eq!(&output.bytes[..8], b"\x89PNG\r\n\x1a\n");

    let image = decode_image(&output.bytes).unwrap();
    assert_eq!((image.width(), image.height()), (200, 120));
}

#[test]
fn test_visible_change_with_a_real_font() {
    let watermarker = fixtures::system_watermarker();
    if watermarker.fonts().source() == FontSource::Synthetic {
        return;
    }

    let config = WatermarkConfig::builder("CONFIDENTIAL")
        .opacity(1.0)
        .font_size(48)
        .position(WatermarkPosition::Center)
        .build()
        .unwrap();
    let input = fixtures::png(600, 400, [255, 255, 255, 255]);
    let output = watermarker.watermark("page.png", &input, &config).unwrap();
    assert_eq!(output.report.stamped, 1);

    let image = decode_image(&output.bytes).unwrap().to_rgba8();
    let changed = image
        .pixels()
        .filter(|pixel| **pixel != Rgba([255, 255, 255, 255]))
        .count();
    assert!(changed > 0);
}

#[test]
fn test_transparent_source_keeps_alpha() {
    let config = WatermarkConfig::builder("SAMPLE").build().unwrap();
    let input = fixtures::png(40, 30, [0, 0, 0, 0]);
    let rendered = RasterRenderer::default()
        .watermark_bytes(&input, &config, &ResolvedFont::synthetic(12.0))
        .unwrap();

    let output = decode_image(&rendered.bytes).unwrap().to_rgba8();
    assert_eq!(output.get_pixel(0, 0)[3], 0);
}
