// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the recognition engines
//!
//! Raw product images are converted to a single intensity channel and
//! binarized with Otsu's method before any recognition runs. The automatic
//! threshold suppresses illumination variance across catalog photos without
//! a hand-tuned constant.

use image::{imageops, imageops::FilterType, DynamicImage, GrayImage, Luma};
use ndarray::Array4;

/// Square input size for the region detection model
pub const DET_INPUT_SIZE: u32 = 640;

/// Recognition model input height
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Maximum width for a cropped-region recognition input
pub const REC_MAX_WIDTH: u32 = 320;

/// Maximum width for a full-page band recognition input
pub const PAGE_BAND_MAX_WIDTH: u32 = 960;

/// Mean values for normalization (ImageNet)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for normalization (ImageNet)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A normalized, binarized single-channel image ready for recognition.
///
/// Owned by the detection call that consumes it and discarded afterwards.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    image: GrayImage,
}

impl PreprocessedImage {
    pub fn new(image: GrayImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }
}

/// Normalize a raw image for text recognition
///
/// Steps:
/// 1. Convert to single-channel intensity
/// 2. Binarize with Otsu's variance-maximizing global threshold
///
/// Deterministic for identical input bytes; cannot fail (decode errors are
/// surfaced earlier by `image_utils::decode_image_bytes`).
pub fn preprocess(image: &DynamicImage) -> PreprocessedImage {
    let gray = image.to_luma8();
    let threshold = otsu_threshold(&histogram(&gray));

    let mut binary = gray;
    for pixel in binary.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }

    PreprocessedImage::new(binary)
}

/// 256-bin intensity histogram
fn histogram(gray: &GrayImage) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for pixel in gray.pixels() {
        hist[pixel.0[0] as usize] += 1;
    }
    hist
}

/// Otsu's method: pick the threshold that maximizes between-class variance
///
/// Returns 0 for degenerate (empty or single-intensity) histograms, which
/// makes every non-zero pixel foreground.
pub fn otsu_threshold(hist: &[u32; 256]) -> u8 {
    let total: u64 = hist.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return 0;
    }

    let weighted_total: u64 = hist
        .iter()
        .enumerate()
        .map(|(value, &count)| value as u64 * count as u64)
        .sum();

    let mut best_threshold = 0u8;
    let mut best_variance = 0.0f64;
    let mut background_count = 0u64;
    let mut background_sum = 0u64;

    for threshold in 0..256usize {
        background_count += hist[threshold] as u64;
        if background_count == 0 {
            continue;
        }

        let foreground_count = total - background_count;
        if foreground_count == 0 {
            break;
        }

        background_sum += threshold as u64 * hist[threshold] as u64;

        let background_mean = background_sum as f64 / background_count as f64;
        let foreground_mean = (weighted_total - background_sum) as f64 / foreground_count as f64;

        let variance = background_count as f64
            * foreground_count as f64
            * (background_mean - foreground_mean).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_threshold = threshold as u8;
        }
    }

    best_threshold
}

/// Scale factor and padding offsets applied when fitting an image into the
/// square detection input; used to map detection boxes back to original
/// image coordinates.
#[derive(Debug, Clone, Copy)]
pub struct ScaleInfo {
    /// Scale factor applied
    pub scale: f32,
    /// X offset from padding
    pub offset_x: u32,
    /// Y offset from padding
    pub offset_y: u32,
}

impl ScaleInfo {
    /// Calculate the fit of an image into a square target
    pub fn fit(width: u32, height: u32, target_size: u32) -> Self {
        if width == 0 || height == 0 {
            return Self {
                scale: 1.0,
                offset_x: 0,
                offset_y: 0,
            };
        }

        let scale = (target_size as f32 / width as f32).min(target_size as f32 / height as f32);
        let new_w = (width as f32 * scale).round() as u32;
        let new_h = (height as f32 * scale).round() as u32;

        Self {
            scale,
            offset_x: (target_size - new_w) / 2,
            offset_y: (target_size - new_h) / 2,
        }
    }

    /// Map a coordinate from detection-input space back to original space
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.offset_x as f32) / self.scale;
        let orig_y = (y - self.offset_y as f32) / self.scale;
        (orig_x, orig_y)
    }
}

/// Build the NCHW detection tensor [1, 3, S, S] from a preprocessed image
///
/// The single intensity channel is replicated across RGB and normalized
/// with ImageNet mean/std, matching what the detection model was exported
/// with. Aspect ratio is preserved; padding is mid-gray (128).
pub fn detection_tensor(image: &PreprocessedImage) -> Array4<f32> {
    let fitted = resize_with_padding(image.as_gray(), DET_INPUT_SIZE);
    gray_to_nchw(&fitted)
}

/// Build an NCHW recognition tensor [1, 3, 48, W] from a horizontal strip
///
/// Width scales with the strip's aspect ratio, clamped to `max_width`.
pub fn strip_tensor(strip: &GrayImage, max_width: u32) -> Array4<f32> {
    let (orig_w, orig_h) = strip.dimensions();

    let scale = REC_INPUT_HEIGHT as f32 / orig_h.max(1) as f32;
    let new_width = ((orig_w as f32 * scale).round() as u32)
        .min(max_width)
        .max(4);

    let resized = imageops::resize(strip, new_width, REC_INPUT_HEIGHT, FilterType::Lanczos3);
    gray_to_nchw(&resized)
}

/// Resize with aspect ratio preservation, centered on a mid-gray square
fn resize_with_padding(gray: &GrayImage, target_size: u32) -> GrayImage {
    let (orig_w, orig_h) = gray.dimensions();

    if orig_w == 0 || orig_h == 0 {
        return GrayImage::from_pixel(target_size, target_size, Luma([128]));
    }

    let info = ScaleInfo::fit(orig_w, orig_h, target_size);
    let new_w = ((orig_w as f32 * info.scale).round() as u32).max(1);
    let new_h = ((orig_h as f32 * info.scale).round() as u32).max(1);

    let resized = imageops::resize(gray, new_w, new_h, FilterType::Lanczos3);

    let mut output = GrayImage::from_pixel(target_size, target_size, Luma([128]));
    for y in 0..new_h {
        for x in 0..new_w {
            output.put_pixel(x + info.offset_x, y + info.offset_y, *resized.get_pixel(x, y));
        }
    }

    output
}

/// Replicate a gray image across three channels and normalize into NCHW
fn gray_to_nchw(gray: &GrayImage) -> Array4<f32> {
    let (width, height) = gray.dimensions();
    let mut tensor = Array4::zeros((1, 3, height as usize, width as usize));

    for y in 0..height as usize {
        for x in 0..width as usize {
            let value = gray.get_pixel(x as u32, y as u32).0[0] as f32 / 255.0;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (value - MEAN[c]) / STD[c];
            }
        }
    }

    tensor
}
