// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! CTC text recognition for cropped regions
//!
//! Shared by both engines: the region engine recognizes each detected crop,
//! the full-page engine reuses the dictionary loader and the greedy CTC
//! decoder for its band sweep.

use anyhow::{Context, Result};
use ndarray::{Array4, ArrayViewD, IxDyn};
use ort::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::build_cpu_session;
use crate::vision::preprocessing::REC_INPUT_HEIGHT;

/// Recognized text for one strip with its decode confidence
#[derive(Debug, Clone)]
pub struct RecognizedLine {
    /// The recognized text content
    pub text: String,
    /// Mean per-character probability (0.0-1.0)
    pub confidence: f32,
}

impl RecognizedLine {
    /// Check if the text is empty or whitespace only
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// CTC recognition model with its character dictionary
#[derive(Clone)]
pub struct TextRecognizer {
    session: Arc<Mutex<ort::session::Session>>,
    dictionary: Arc<Vec<char>>,
    input_name: String,
}

impl std::fmt::Debug for TextRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRecognizer")
            .field("dictionary_size", &self.dictionary.len())
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl TextRecognizer {
    /// Load the recognition model and its character dictionary
    pub fn load<P: AsRef<Path>>(model_path: P, dict_path: P) -> Result<Self> {
        let dictionary = load_dictionary(dict_path.as_ref())?;
        debug!("loaded character dictionary with {} entries", dictionary.len());

        let session = build_cpu_session(model_path.as_ref())?;
        let input_name = super::session_input_name(&session, "x");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            dictionary: Arc::new(dictionary),
            input_name,
        })
    }

    /// Dictionary shared with the full-page engine
    pub fn dictionary(&self) -> Arc<Vec<char>> {
        Arc::clone(&self.dictionary)
    }

    /// Recognize text from a strip tensor of shape [1, 3, 48, W]
    pub fn recognize(&self, input: &Array4<f32>) -> Result<RecognizedLine> {
        let shape = input.shape();
        if shape.len() != 4
            || shape[0] != 1
            || shape[1] != 3
            || shape[2] != REC_INPUT_HEIGHT as usize
            || shape[3] < 4
        {
            anyhow::bail!(
                "Invalid input shape: {:?}, expected [1, 3, {}, W>=4]",
                shape,
                REC_INPUT_HEIGHT
            );
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("recognition session poisoned"))?;

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Recognition inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let (text, confidence) = ctc_greedy_decode(&output_tensor.view(), &self.dictionary)?;
        Ok(RecognizedLine { text, confidence })
    }
}

/// Load a character dictionary, one character per line
///
/// Index 0 is the CTC blank token.
pub(crate) fn load_dictionary(path: &Path) -> Result<Vec<char>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open dictionary: {}", path.display()))?;

    let reader = BufReader::new(file);
    let mut dictionary = vec![' ']; // index 0 is the CTC blank

    for line in reader.lines() {
        let line = line.context("Failed to read dictionary line")?;
        if let Some(ch) = line.chars().next() {
            dictionary.push(ch);
        }
    }

    if !dictionary[1..].contains(&' ') {
        dictionary.push(' ');
    }

    Ok(dictionary)
}

/// Greedy CTC decode: best class per timestep, collapse repeats, drop blanks
///
/// Accepts [batch, seq, classes] or [seq, classes] output layouts.
pub(crate) fn ctc_greedy_decode(
    output: &ArrayViewD<f32>,
    dictionary: &[char],
) -> Result<(String, f32)> {
    let output_shape = output.shape();

    let (seq_len, num_classes, batched) = match output_shape.len() {
        3 => (output_shape[1], output_shape[2], true),
        2 => (output_shape[0], output_shape[1], false),
        _ => anyhow::bail!("Unexpected recognition output shape: {:?}", output_shape),
    };

    let mut text = String::new();
    let mut confidence_sum = 0.0f32;
    let mut decoded = 0usize;
    let mut prev_index: Option<usize> = None;

    for t in 0..seq_len {
        let mut max_prob = f32::NEG_INFINITY;
        let mut max_index = 0usize;

        for c in 0..num_classes {
            let prob = if batched {
                output[IxDyn(&[0, t, c])]
            } else {
                output[IxDyn(&[t, c])]
            };
            if prob > max_prob {
                max_prob = prob;
                max_index = c;
            }
        }

        // Blank is index 0; collapse repeated classes
        if max_index != 0 && Some(max_index) != prev_index {
            if let Some(&ch) = dictionary.get(max_index) {
                text.push(ch);
                confidence_sum += max_prob;
                decoded += 1;
            }
        }

        prev_index = if max_index == 0 { None } else { Some(max_index) };
    }

    let confidence = if decoded == 0 {
        0.0
    } else {
        confidence_sum / decoded as f32
    };

    Ok((text, confidence))
}
