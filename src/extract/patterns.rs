// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The typed parameter-pattern table
//!
//! Each parameter type owns one regex with a closed unit vocabulary. The
//! table is immutable after construction and shared read-only by all batch
//! workers; alternate tables can be injected (or loaded from JSON) in place
//! of the builtin one.
//!
//! Patterns are written lowercase; span text is lowercased before matching,
//! so patterns must never depend on case.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Version tag of the builtin table
pub const BUILTIN_TABLE_VERSION: &str = "ppv-2024.1";

/// How a pattern's capture groups map to the extracted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupLayout {
    /// Group 1 is the value; the unit alternation is non-capturing
    ValueOnly,
    /// Group 1 is the value, group 2 the unit
    ValueAndUnit,
}

/// One compiled parameter pattern
#[derive(Debug, Clone)]
pub struct ParameterPattern {
    /// Parameter type this pattern resolves (lowercase)
    pub type_name: String,
    /// Compiled lowercase regex with a closed unit alternation
    pub regex: Regex,
    /// Capture-group layout
    pub layout: GroupLayout,
}

/// Errors constructing a pattern table
#[derive(Debug, Error)]
pub enum PatternTableError {
    #[error("Failed to read pattern table file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse pattern table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid regex for parameter type '{type_name}': {source}")]
    InvalidRegex {
        type_name: String,
        source: regex::Error,
    },
}

/// Serialized form of one table entry (JSON loading)
#[derive(Debug, Deserialize)]
struct PatternEntry {
    type_name: String,
    pattern: String,
    layout: GroupLayout,
}

/// Immutable, versioned pattern table
#[derive(Debug, Clone)]
pub struct PatternTable {
    version: String,
    patterns: HashMap<String, ParameterPattern>,
}

impl PatternTable {
    /// The builtin table: eight physical-measurement parameter types
    pub fn builtin() -> Self {
        let entries = [
            ("voltage", r"(\d+(?:\.\d+)?)\s*(?:v|volt|kv|mv)(?:s)?\b", GroupLayout::ValueOnly),
            ("weight", r"(\d+(?:\.\d+)?)\s*(g|kg|lbs?|oz|mg)\b", GroupLayout::ValueAndUnit),
            ("height", r"(\d+(?:\.\d+)?)\s*(cm|m|inch|ft|mm)\b", GroupLayout::ValueAndUnit),
            ("volume", r"(\d+(?:\.\d+)?)\s*(ml|l|fl\s?oz|gal)\b", GroupLayout::ValueAndUnit),
            ("wattage", r"(\d+(?:\.\d+)?)\s*(w|watt|mw)(?:s)?\b", GroupLayout::ValueAndUnit),
            ("depth", r"(?:depth|d):\s*(\d+(?:\.\d+)?)\s*(cm|m|inch|ft|mm)\b", GroupLayout::ValueAndUnit),
            ("width", r"(?:width|w):\s*(\d+(?:\.\d+)?)\s*(cm|m|inch|ft|mm)\b", GroupLayout::ValueAndUnit),
            (
                "max_weight",
                r"(?:max(?:imum)?\s*weight|weight\s*capacity):\s*(\d+(?:\.\d+)?)\s*(kg|lbs?)\b",
                GroupLayout::ValueAndUnit,
            ),
        ];

        let patterns = entries
            .into_iter()
            .map(|(type_name, pattern, layout)| {
                let regex = Regex::new(pattern).expect("builtin pattern must compile");
                (
                    type_name.to_string(),
                    ParameterPattern {
                        type_name: type_name.to_string(),
                        regex,
                        layout,
                    },
                )
            })
            .collect();

        Self {
            version: BUILTIN_TABLE_VERSION.to_string(),
            patterns,
        }
    }

    /// Build a table from explicit (type, pattern, layout) entries
    pub fn from_entries<I>(version: &str, entries: I) -> Result<Self, PatternTableError>
    where
        I: IntoIterator<Item = (String, String, GroupLayout)>,
    {
        let mut patterns = HashMap::new();
        for (type_name, pattern, layout) in entries {
            let type_name = type_name.to_lowercase();
            let regex = Regex::new(&pattern).map_err(|source| PatternTableError::InvalidRegex {
                type_name: type_name.clone(),
                source,
            })?;
            patterns.insert(
                type_name.clone(),
                ParameterPattern {
                    type_name,
                    regex,
                    layout,
                },
            );
        }

        Ok(Self {
            version: version.to_string(),
            patterns,
        })
    }

    /// Load a substitute table from a JSON file
    ///
    /// Format: `{"version": "...", "patterns": [{"type_name", "pattern",
    /// "layout"}, ...]}`.
    pub fn from_json_file(path: &Path) -> Result<Self, PatternTableError> {
        #[derive(Deserialize)]
        struct TableFile {
            version: String,
            patterns: Vec<PatternEntry>,
        }

        let raw = std::fs::read_to_string(path)?;
        let parsed: TableFile = serde_json::from_str(&raw)?;

        Self::from_entries(
            &parsed.version,
            parsed
                .patterns
                .into_iter()
                .map(|entry| (entry.type_name, entry.pattern, entry.layout)),
        )
    }

    /// Table version tag
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up a parameter type (case-insensitive)
    pub fn get(&self, type_name: &str) -> Option<&ParameterPattern> {
        self.patterns.get(&type_name.to_lowercase())
    }

    /// Number of parameter types in the table
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::builtin()
    }
}
