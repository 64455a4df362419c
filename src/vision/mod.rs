// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for CPU-based measurement extraction
//!
//! This module provides:
//! - Image decoding with format detection
//! - Preprocessing (grayscale + Otsu binarization)
//! - Dual-engine OCR with evidence-stream fusion
//!
//! Everything runs CPU-only.

pub mod image_utils;
pub mod ocr;
pub mod preprocessing;

pub use image_utils::{decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use ocr::{EngineKind, TextDetector, TextSpan};
pub use preprocessing::{preprocess, PreprocessedImage};
