// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the catalog OCR extractor

/// Full version string with feature description
pub const VERSION: &str = "v1.2.0-hash-keyed-store-2025-07-18";

/// Semantic version number
pub const VERSION_NUMBER: &str = "1.2.0";

/// Build date
pub const BUILD_DATE: &str = "2025-07-18";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "dual-engine-fusion",
    "first-match-extraction",
    "bounded-worker-pool",
    "per-row-timeout",
    "hash-keyed-image-store",
    "tagged-row-outcomes",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Catalog OCR Extractor {} ({})", VERSION_NUMBER, BUILD_DATE)
}
