//! Raster decode/encode through the `image` crate.

use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageEncoder, RgbaImage};

use crate::error::WatermarkError;

const FORMAT: &str = "image";

/// Decode any supported raster format, sniffing the container from the bytes.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, WatermarkError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| WatermarkError::decode(FORMAT, e.to_string()))?
        .decode()
        .map_err(|e| WatermarkError::decode(FORMAT, e.to_string()))
}

/// Encode RGBA pixels as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, WatermarkError> {
    let mut output = Cursor::new(Vec::new());
    PngEncoder::new(&mut output)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|e| WatermarkError::encode("png", e.to_string()))?;
    Ok(output.into_inner())
}
