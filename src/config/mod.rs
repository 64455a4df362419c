// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline configuration
//!
//! Everything the orchestrator and its services need is explicit
//! construction-time data - there are no module-level mutable globals, and
//! tests can substitute any of it.

use std::collections::HashMap;
use std::path::PathBuf;

/// Batch pipeline tuning
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rows per streaming chunk; chunks are processed strictly one at a time
    pub chunk_size: usize,
    /// Fixed number of concurrently in-flight rows within a chunk
    pub worker_slots: usize,
    /// HTTP timeout for one image fetch
    pub fetch_timeout_secs: u64,
    /// Hard ceiling for one row's whole pipeline; a stall becomes a Failed row
    pub row_timeout_secs: u64,
    /// Directory acquired image bytes are persisted under
    pub image_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            worker_slots: 10,
            fetch_timeout_secs: 10,
            row_timeout_secs: 120,
            image_dir: PathBuf::from("./images"),
        }
    }
}

/// Model artifact locations for the two engines
#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Region engine detection model (ONNX)
    pub detection_model: PathBuf,
    /// Region engine recognition model (ONNX)
    pub recognition_model: PathBuf,
    /// Full-page transcription model (ONNX)
    pub fullpage_model: PathBuf,
    /// Character dictionary shared by both recognizers
    pub dictionary: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            detection_model: PathBuf::from("./models/ocr/det_model.onnx"),
            recognition_model: PathBuf::from("./models/ocr/rec_model.onnx"),
            fullpage_model: PathBuf::from("./models/ocr/page_model.onnx"),
            dictionary: PathBuf::from("./models/ocr/keys.txt"),
        }
    }
}

/// Entity-name to parameter-type mapping
///
/// Unmapped entity names pass through as their own parameter type, which
/// acts as the default.
#[derive(Debug, Clone)]
pub struct EntityMapping {
    map: HashMap<String, String>,
}

impl EntityMapping {
    /// Build a mapping from explicit pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            map: pairs
                .into_iter()
                .map(|(entity, parameter)| (entity.into(), parameter.into()))
                .collect(),
        }
    }

    /// Resolve an entity name to its parameter type
    pub fn resolve(&self, entity_name: &str) -> String {
        self.map
            .get(entity_name)
            .cloned()
            .unwrap_or_else(|| entity_name.to_string())
    }

    /// Number of explicit mappings
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for EntityMapping {
    /// The catalog's standard entity names
    fn default() -> Self {
        Self::from_pairs([
            ("item_weight", "weight"),
            ("item_volume", "volume"),
            ("max_weight_recommendation", "max_weight"),
            ("height", "height"),
            ("width", "width"),
            ("voltage", "voltage"),
            ("wattage", "wattage"),
            ("depth", "depth"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.worker_slots, 10);
        assert_eq!(config.fetch_timeout_secs, 10);
    }

    #[test]
    fn test_entity_mapping_known_names() {
        let mapping = EntityMapping::default();
        assert_eq!(mapping.resolve("item_weight"), "weight");
        assert_eq!(mapping.resolve("item_volume"), "volume");
        assert_eq!(mapping.resolve("max_weight_recommendation"), "max_weight");
        assert_eq!(mapping.len(), 8);
    }

    #[test]
    fn test_entity_mapping_passthrough() {
        let mapping = EntityMapping::default();
        assert_eq!(mapping.resolve("torque"), "torque");
    }

    #[test]
    fn test_entity_mapping_substitute_table() {
        let mapping = EntityMapping::from_pairs([("net_wt", "weight")]);
        assert_eq!(mapping.resolve("net_wt"), "weight");
        assert_eq!(mapping.resolve("item_weight"), "item_weight");
    }
}
