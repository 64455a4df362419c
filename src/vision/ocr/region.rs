// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The region engine: detection + per-crop recognition
//!
//! Produces ranked (box, text, confidence) triples the way a region-based
//! reader does: find boxes, crop each from the preprocessed page, recognize
//! each crop. Ranking is the detector's internal ordering.

use anyhow::Result;
use image::imageops;
use std::path::Path;
use tracing::debug;

use super::detection::{RegionDetector, TextBox};
use super::detector::RegionReader;
use super::recognition::TextRecognizer;
use crate::vision::preprocessing::{
    detection_tensor, strip_tensor, PreprocessedImage, ScaleInfo, DET_INPUT_SIZE, REC_MAX_WIDTH,
};

/// One recognized region: ranked output of the region engine
#[derive(Debug, Clone)]
pub struct RegionText {
    /// Bounding box in original (preprocessed) image coordinates
    pub bbox: TextBox,
    /// Recognized text content
    pub text: String,
    /// Recognition confidence (0.0-1.0)
    pub confidence: f32,
}

/// Region-based OCR engine: ONNX detection + CTC recognition
#[derive(Debug, Clone)]
pub struct RegionOcrEngine {
    detector: RegionDetector,
    recognizer: TextRecognizer,
}

impl RegionOcrEngine {
    /// Load both models of the region engine
    pub fn load<P: AsRef<Path>>(
        detection_model: P,
        recognition_model: P,
        dictionary: P,
    ) -> Result<Self> {
        let detector = RegionDetector::load(detection_model)?;
        let recognizer = TextRecognizer::load(recognition_model, dictionary)?;
        Ok(Self {
            detector,
            recognizer,
        })
    }

    /// Recognizer handle, for sharing the dictionary with other engines
    pub fn recognizer(&self) -> &TextRecognizer {
        &self.recognizer
    }
}

/// Map a detection-space box to original image coordinates, clamped
fn to_original_box(image: &PreprocessedImage, detected: &TextBox) -> TextBox {
    let info = ScaleInfo::fit(image.width(), image.height(), DET_INPUT_SIZE);
    let (x0, y0) = info.map_to_original(detected.x, detected.y);
    let (x1, y1) = info.map_to_original(detected.x + detected.width, detected.y + detected.height);

    let x = x0.max(0.0).min(image.width() as f32);
    let y = y0.max(0.0).min(image.height() as f32);
    let width = (x1.max(0.0).min(image.width() as f32) - x).max(0.0);
    let height = (y1.max(0.0).min(image.height() as f32) - y).max(0.0);

    TextBox {
        x,
        y,
        width,
        height,
        score: detected.score,
    }
}

impl RegionReader for RegionOcrEngine {
    fn read_regions(&self, image: &PreprocessedImage) -> Result<Vec<RegionText>> {
        let tensor = detection_tensor(image);
        let detected = self.detector.detect(&tensor)?;

        let mut regions = Vec::with_capacity(detected.len());
        for candidate in detected {
            let bbox = to_original_box(image, &candidate);
            if bbox.width < 1.0 || bbox.height < 1.0 {
                continue;
            }

            let crop = imageops::crop_imm(
                image.as_gray(),
                bbox.x as u32,
                bbox.y as u32,
                bbox.width as u32,
                bbox.height as u32,
            )
            .to_image();

            let line = self.recognizer.recognize(&strip_tensor(&crop, REC_MAX_WIDTH))?;
            if line.is_empty() {
                continue;
            }

            regions.push(RegionText {
                bbox,
                text: line.text,
                confidence: line.confidence,
            });
        }

        debug!("region engine produced {} text regions", regions.len());
        Ok(regions)
    }
}
