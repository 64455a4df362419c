// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod batch;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod extract;
pub mod fetch;
pub mod version;
pub mod vision;

// Re-export the types a batch run is wired from
pub use batch::{BatchOrchestrator, BatchResult, BatchSummary, RowError, RowOutcome, FAILURE_SENTINEL};
pub use config::{EntityMapping, ModelPaths, PipelineConfig};
pub use dataset::{DatasetReader, DatasetRow};
pub use extract::{ExtractedParameter, GroupLayout, ParameterExtractor, PatternTable};
pub use fetch::{FetchError, HttpImageStore, ImageFetcher};
pub use vision::{
    decode_image_bytes, preprocess, EngineKind, ImageError, PreprocessedImage, TextDetector,
    TextSpan,
};
