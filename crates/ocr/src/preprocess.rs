use image::{DynamicImage, GrayImage, Luma};
use std::io::Cursor;
use thiserror::Error;

/// Global binarization cut-off on the 0–255 intensity scale.
pub const BINARY_THRESHOLD: u8 = 150;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Process raw image bytes (JPEG / PNG / WEBP / …) and return binarized PNG bytes.
pub fn prepare_for_ocr_from_bytes(data: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    encode_as_png(binarize(&img))
}

/// Grayscale, then fixed threshold: `>= BINARY_THRESHOLD` becomes white, the rest black.
pub fn binarize(img: &DynamicImage) -> GrayImage {
    let mut gray = img.to_luma8();
    for Luma([p]) in gray.pixels_mut() {
        *p = if *p >= BINARY_THRESHOLD { u8::MAX } else { 0 };
    }
    gray
}

fn encode_as_png(img: GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
