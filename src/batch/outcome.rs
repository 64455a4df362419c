// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tagged per-row outcomes
//!
//! Internally every row terminates in a typed outcome so logs and tests can
//! tell "could not even look" from "looked and found nothing". The
//! user-facing output column still flattens every non-resolved outcome to
//! the legacy sentinel string for backward compatibility.

use thiserror::Error;

use crate::extract::ExtractedParameter;
use crate::fetch::FetchError;
use crate::vision::ImageError;

/// Flattened placeholder for any non-resolved row in the output artifact
pub const FAILURE_SENTINEL: &str = "No result";

/// Why a row failed before extraction could finish
#[derive(Debug, Error)]
pub enum RowError {
    #[error("image acquisition failed: {0}")]
    Acquisition(#[from] FetchError),

    #[error("image bytes could not be decoded: {0}")]
    Decode(#[from] ImageError),

    #[error("row processing exceeded {seconds}s")]
    Timeout { seconds: u64 },

    #[error("row worker died: {0}")]
    Worker(String),
}

/// Terminal state of one row's pipeline
#[derive(Debug)]
pub enum RowOutcome {
    /// A parameter was extracted
    Resolved(ExtractedParameter),
    /// Pipeline ran to completion but no pattern matched any span
    NoMatch,
    /// Acquisition, decode, or a stall ended the row early
    Failed(RowError),
}

impl RowOutcome {
    /// Flatten to the output-column string
    pub fn into_prediction(self) -> String {
        match self {
            RowOutcome::Resolved(parameter) => parameter.render(),
            RowOutcome::NoMatch | RowOutcome::Failed(_) => FAILURE_SENTINEL.to_string(),
        }
    }

    /// Short tag for logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            RowOutcome::Resolved(_) => "resolved",
            RowOutcome::NoMatch => "no_match",
            RowOutcome::Failed(_) => "failed",
        }
    }
}

/// Stages a row moves through; logged as the pipeline advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStage {
    Pending,
    Acquiring,
    Preprocessing,
    Detecting,
    Extracting,
}

impl std::fmt::Display for RowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RowStage::Pending => "pending",
            RowStage::Acquiring => "acquiring",
            RowStage::Preprocessing => "preprocessing",
            RowStage::Detecting => "detecting",
            RowStage::Extracting => "extracting",
        };
        f.write_str(name)
    }
}

/// One reassembled result: a row index and its terminal outcome
#[derive(Debug)]
pub struct BatchResult {
    /// Absolute input row index
    pub row_index: usize,
    /// Terminal outcome for that row
    pub outcome: RowOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameter() -> ExtractedParameter {
        ExtractedParameter {
            type_name: "weight".to_string(),
            value: "2.5".to_string(),
            unit: "kg".to_string(),
        }
    }

    #[test]
    fn test_resolved_flattens_to_value_unit() {
        let outcome = RowOutcome::Resolved(parameter());
        assert_eq!(outcome.into_prediction(), "2.5 kg");
    }

    #[test]
    fn test_no_match_flattens_to_sentinel() {
        assert_eq!(RowOutcome::NoMatch.into_prediction(), FAILURE_SENTINEL);
    }

    #[test]
    fn test_failed_flattens_to_sentinel() {
        let outcome = RowOutcome::Failed(RowError::Timeout { seconds: 120 });
        assert_eq!(outcome.into_prediction(), FAILURE_SENTINEL);
    }

    #[test]
    fn test_labels_distinguish_causes() {
        assert_eq!(RowOutcome::Resolved(parameter()).label(), "resolved");
        assert_eq!(RowOutcome::NoMatch.label(), "no_match");
        assert_eq!(
            RowOutcome::Failed(RowError::Timeout { seconds: 1 }).label(),
            "failed"
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(RowStage::Acquiring.to_string(), "acquiring");
        assert_eq!(RowStage::Extracting.to_string(), "extracting");
    }
}
