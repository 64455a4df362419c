// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The full-page engine: band-sweep transcription
//!
//! No detection stage. The page is read as full-width horizontal bands fed
//! through a CTC recognition session top to bottom, and the decoded bands
//! are joined into one undifferentiated text block. No boxes, no
//! confidences - the block is split into lines downstream.

use anyhow::{Context, Result};
use image::imageops;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::detector::PageReader;
use super::recognition::{ctc_greedy_decode, load_dictionary};
use super::{build_cpu_session, session_input_name};
use crate::vision::preprocessing::{strip_tensor, PreprocessedImage, PAGE_BAND_MAX_WIDTH};

/// Default height in source pixels of one sweep band
const DEFAULT_BAND_HEIGHT: u32 = 64;

/// Bands shorter than this are sliver remainders and skipped
const MIN_BAND_HEIGHT: u32 = 8;

/// Full-page OCR engine
#[derive(Clone)]
pub struct FullPageOcrEngine {
    session: Arc<Mutex<ort::session::Session>>,
    dictionary: Arc<Vec<char>>,
    input_name: String,
    band_height: u32,
}

impl std::fmt::Debug for FullPageOcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullPageOcrEngine")
            .field("dictionary_size", &self.dictionary.len())
            .field("input_name", &self.input_name)
            .field("band_height", &self.band_height)
            .finish_non_exhaustive()
    }
}

impl FullPageOcrEngine {
    /// Load the transcription model and its character dictionary
    pub fn load<P: AsRef<Path>>(model_path: P, dict_path: P) -> Result<Self> {
        let dictionary = load_dictionary(dict_path.as_ref())?;
        let session = build_cpu_session(model_path.as_ref())?;
        let input_name = session_input_name(&session, "x");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            dictionary: Arc::new(dictionary),
            input_name,
            band_height: DEFAULT_BAND_HEIGHT,
        })
    }

    /// Override the sweep band height in source pixels
    pub fn with_band_height(mut self, band_height: u32) -> Self {
        self.band_height = band_height.max(MIN_BAND_HEIGHT);
        self
    }

    /// Decode one band tensor through the session
    fn transcribe_band(&self, band: &image::GrayImage) -> Result<String> {
        let tensor = strip_tensor(band, PAGE_BAND_MAX_WIDTH);

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("full-page session poisoned"))?;

        let input_value =
            Value::from_array(tensor).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Full-page inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let (text, _) = ctc_greedy_decode(&output_tensor.view(), &self.dictionary)?;
        Ok(text)
    }
}

impl PageReader for FullPageOcrEngine {
    fn read_page(&self, image: &PreprocessedImage) -> Result<String> {
        let gray = image.as_gray();
        let (width, height) = gray.dimensions();

        let mut lines = Vec::new();
        let mut y = 0u32;
        while y < height {
            let band_height = self.band_height.min(height - y);
            if band_height >= MIN_BAND_HEIGHT {
                let band = imageops::crop_imm(gray, 0, y, width, band_height).to_image();
                let text = self.transcribe_band(&band)?;
                if !text.trim().is_empty() {
                    lines.push(text);
                }
            }
            y += self.band_height;
        }

        debug!("full-page engine produced {} band lines", lines.len());
        Ok(lines.join("\n"))
    }
}
