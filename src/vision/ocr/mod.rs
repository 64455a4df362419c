// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Dual-engine text recognition for product images
//!
//! Two structurally different engines run over every preprocessed image:
//! - `region` (via `detection` + `recognition`) - ranked text regions with
//!   bounding boxes and confidences
//! - `fullpage` - one undifferentiated text block read in full-width bands
//!
//! `detector` fuses both outputs into a single ordered evidence stream.
//! All inference runs CPU-only.

pub mod detection;
pub mod detector;
pub mod fullpage;
pub mod recognition;
pub mod region;

pub use detection::{RegionDetector, TextBox};
pub use detector::{EngineKind, PageReader, RegionReader, TextDetector, TextSpan};
pub use fullpage::FullPageOcrEngine;
pub use recognition::{RecognizedLine, TextRecognizer};
pub use region::{RegionOcrEngine, RegionText};

use anyhow::{Context, Result};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;

/// Build a CPU-only ONNX session the way every engine here needs one
///
/// All engines share this configuration: CPU execution provider (no GPU),
/// full graph optimization, a small intra-op thread count.
pub(crate) fn build_cpu_session(model_path: &Path) -> Result<Session> {
    if !model_path.exists() {
        anyhow::bail!("ONNX model not found: {}", model_path.display());
    }

    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(4)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))
}

/// First input name of a session, with a fallback for models exported
/// without one
pub(crate) fn session_input_name(session: &Session, default_in: &str) -> String {
    session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .unwrap_or_else(|| default_in.to_string())
}
