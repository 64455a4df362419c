// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image loading and utility functions for the vision pipeline

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Maximum image size (10MB)
const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Custom error types for image decoding
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// Size in bytes
    pub size_bytes: usize,
}

/// Decode raw image bytes fetched from a product-image URL
///
/// # Arguments
/// * `bytes` - Raw image bytes
///
/// # Returns
/// * `Ok((DynamicImage, ImageInfo))` - The decoded image and metadata
/// * `Err(ImageError)` - If decoding fails
pub fn decode_image_bytes(bytes: &[u8]) -> Result<(DynamicImage, ImageInfo), ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
    }

    // Detect format from magic bytes
    let format = detect_format(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        size_bytes: bytes.len(),
    };

    Ok((img, info))
}

/// Detect image format from magic bytes
///
/// Supports PNG, JPEG, WebP, and GIF - the formats product catalogs
/// actually serve.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 12 {
        return Err(ImageError::UnsupportedFormat);
    }

    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Ok(ImageFormat::Png);
    }

    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Ok(ImageFormat::Jpeg);
    }

    if bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Ok(ImageFormat::WebP);
    }

    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Ok(ImageFormat::Gif);
    }

    Err(ImageError::UnsupportedFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("png encoding");
        bytes
    }

    #[test]
    fn test_decode_empty_bytes() {
        let result = decode_image_bytes(&[]);
        assert!(matches!(result, Err(ImageError::EmptyData)));
    }

    #[test]
    fn test_decode_garbage_bytes() {
        let result = decode_image_bytes(&[0u8; 64]);
        assert!(matches!(result, Err(ImageError::UnsupportedFormat)));
    }

    #[test]
    fn test_decode_truncated_png() {
        // Valid magic, missing body
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 8]);
        let result = decode_image_bytes(&bytes);
        assert!(matches!(result, Err(ImageError::DecodeFailed(_))));
    }

    #[test]
    fn test_decode_valid_png() {
        let bytes = png_bytes(20, 10);
        let (img, info) = decode_image_bytes(&bytes).expect("decode");
        assert_eq!(img.width(), 20);
        assert_eq!(info.height, 10);
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!(info.size_bytes, bytes.len());
    }

    #[test]
    fn test_detect_format_png() {
        let bytes = png_bytes(2, 2);
        assert_eq!(detect_format(&bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_detect_format_jpeg() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(&[0u8; 16]);
        assert_eq!(detect_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_detect_format_gif() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        assert_eq!(detect_format(&bytes).unwrap(), ImageFormat::Gif);
    }

    #[test]
    fn test_detect_format_too_short() {
        assert!(detect_format(&[0x89, 0x50]).is_err());
    }

    #[test]
    fn test_decode_too_large() {
        // Fake a PNG header with an oversized payload claim
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47];
        bytes.resize(MAX_IMAGE_SIZE + 1, 0);
        let result = decode_image_bytes(&bytes);
        assert!(matches!(result, Err(ImageError::TooLarge(_, _))));
    }
}
