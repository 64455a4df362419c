// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! First-match-wins parameter extraction over the fused evidence stream
//!
//! The walk is strictly in span order: the earliest matching span decides a
//! parameter's value, later matches for the same type are ignored. One span
//! may resolve several still-unresolved types. "5 kg" and "5000 g" are
//! distinct, non-comparable outputs - no cross-unit equivalence is applied.

use std::collections::HashMap;
use tracing::debug;

use super::patterns::{GroupLayout, ParameterPattern, PatternTable};
use crate::vision::ocr::TextSpan;

/// One extracted parameter value
///
/// `value` is the raw matched numeral, never unit-converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedParameter {
    /// Parameter type that matched
    pub type_name: String,
    /// Raw numeral text
    pub value: String,
    /// Matched unit token; empty for value-only patterns
    pub unit: String,
}

impl ExtractedParameter {
    /// Render as the output-column string: `"value unit"`, or just the
    /// value when the pattern carries no unit group
    pub fn render(&self) -> String {
        if self.unit.is_empty() {
            self.value.clone()
        } else {
            format!("{} {}", self.value, self.unit)
        }
    }
}

/// Parameter extractor over an injected pattern table
#[derive(Debug, Clone)]
pub struct ParameterExtractor {
    table: PatternTable,
}

impl ParameterExtractor {
    pub fn new(table: PatternTable) -> Self {
        Self { table }
    }

    /// The table this extractor matches with
    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    /// Resolve the requested parameter types against an evidence stream
    ///
    /// Walks spans in order; each span's text is lowercased once and tried
    /// against every still-unresolved type before the walk advances, so a
    /// single span may resolve more than one type. Returns early once all
    /// requested types are resolved. Types absent from the table are
    /// silently unresolvable - requesting them is not an error.
    pub fn extract(
        &self,
        spans: &[TextSpan],
        requested_types: &[String],
    ) -> HashMap<String, ExtractedParameter> {
        let mut resolved = HashMap::new();

        // Unknown types can never resolve; drop them up front
        let mut unresolved: Vec<&str> = requested_types
            .iter()
            .map(String::as_str)
            .filter(|ty| self.table.get(ty).is_some())
            .collect();
        unresolved.dedup();

        for span in spans {
            if unresolved.is_empty() {
                break;
            }

            let text = span.text.to_lowercase();
            unresolved.retain(|ty| {
                let pattern = match self.table.get(ty) {
                    Some(pattern) => pattern,
                    None => return false,
                };

                match apply_pattern(pattern, &text) {
                    Some(parameter) => {
                        debug!(
                            type_name = %parameter.type_name,
                            span_index = span.order_index,
                            "parameter resolved"
                        );
                        resolved.insert(pattern.type_name.clone(), parameter);
                        false
                    }
                    None => true,
                }
            });
        }

        resolved
    }
}

/// Try one pattern against lowercased span text
fn apply_pattern(pattern: &ParameterPattern, text: &str) -> Option<ExtractedParameter> {
    let captures = pattern.regex.captures(text)?;

    let value = captures.get(1)?.as_str().trim().to_string();
    let unit = match pattern.layout {
        GroupLayout::ValueOnly => String::new(),
        GroupLayout::ValueAndUnit => captures.get(2)?.as_str().trim().to_string(),
    };

    Some(ExtractedParameter {
        type_name: pattern.type_name.clone(),
        value,
        unit,
    })
}
