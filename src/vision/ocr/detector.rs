// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Evidence-stream fusion across the two recognition engines
//!
//! The fused sequence is the region engine's spans (in its ranking order)
//! followed by the full-page block split into lines (in line order).
//! Ordering is significant: it decides first-match-wins outcomes in the
//! parameter extractor. Nothing is deduplicated and no confidence
//! thresholding happens here - a dropped true positive is unrecoverable,
//! while a false positive costs one cheap failed pattern match downstream.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use super::detection::TextBox;
use super::region::RegionText;
use crate::vision::preprocessing::PreprocessedImage;

/// Which engine produced a span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Ranked region engine (boxes + confidences)
    Region,
    /// Full-page band sweep (plain lines)
    FullPage,
}

/// One entry of the fused evidence stream
#[derive(Debug, Clone)]
pub struct TextSpan {
    /// Recognized text; never empty or whitespace-only
    pub text: String,
    /// Engine that produced the span
    pub engine: EngineKind,
    /// Position in the fused sequence
    pub order_index: usize,
    /// Bounding box, region engine only
    pub region: Option<TextBox>,
    /// Recognition confidence, region engine only
    pub confidence: Option<f32>,
}

/// Ranked-region reading: the seam the region engine implements
pub trait RegionReader: Send + Sync {
    fn read_regions(&self, image: &PreprocessedImage) -> Result<Vec<RegionText>>;
}

/// Whole-page reading: the seam the full-page engine implements
pub trait PageReader: Send + Sync {
    fn read_page(&self, image: &PreprocessedImage) -> Result<String>;
}

/// Fusing text detector over both engines
///
/// Engines are long-lived, read-only-after-construction services shared by
/// all batch workers.
#[derive(Clone)]
pub struct TextDetector {
    region: Arc<dyn RegionReader>,
    page: Arc<dyn PageReader>,
}

impl TextDetector {
    pub fn new(region: Arc<dyn RegionReader>, page: Arc<dyn PageReader>) -> Self {
        Self { region, page }
    }

    /// Run both engines and fuse their outputs into one ordered stream
    ///
    /// An engine error costs that engine's evidence only: it is logged and
    /// the other engine's spans still flow through. Zero total spans is a
    /// valid empty stream, not an error.
    pub fn detect(&self, image: &PreprocessedImage) -> Vec<TextSpan> {
        let mut spans: Vec<TextSpan> = Vec::new();

        match self.region.read_regions(image) {
            Ok(regions) => {
                for region in regions {
                    push_span(
                        &mut spans,
                        region.text,
                        EngineKind::Region,
                        Some(region.bbox),
                        Some(region.confidence),
                    );
                }
            }
            Err(err) => {
                warn!("region engine failed, keeping full-page evidence only: {err:#}");
            }
        }

        match self.page.read_page(image) {
            Ok(block) => {
                for line in block.lines() {
                    push_span(
                        &mut spans,
                        line.to_string(),
                        EngineKind::FullPage,
                        None,
                        None,
                    );
                }
            }
            Err(err) => {
                warn!("full-page engine failed, keeping region evidence only: {err:#}");
            }
        }

        debug!("fused evidence stream has {} spans", spans.len());
        spans
    }
}

/// Append a span unless its text is empty or whitespace-only
fn push_span(
    spans: &mut Vec<TextSpan>,
    text: String,
    engine: EngineKind,
    region: Option<TextBox>,
    confidence: Option<f32>,
) {
    if text.trim().is_empty() {
        return;
    }

    spans.push(TextSpan {
        text,
        engine,
        order_index: spans.len(),
        region,
        confidence,
    });
}
