// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Extraction properties over the fused evidence stream

mod common;

use catalog_ocr::extract::{GroupLayout, ParameterExtractor, PatternTable};
use catalog_ocr::vision::ocr::{RegionReader, RegionText, TextBox, TextDetector};
use catalog_ocr::vision::{preprocess, EngineKind, PreprocessedImage, TextSpan};
use common::FixedPage;
use image::DynamicImage;
use std::sync::Arc;

fn spans(texts: &[&str]) -> Vec<TextSpan> {
    texts
        .iter()
        .enumerate()
        .map(|(order_index, text)| TextSpan {
            text: text.to_string(),
            engine: EngineKind::FullPage,
            order_index,
            region: None,
            confidence: None,
        })
        .collect()
}

fn requested(types: &[&str]) -> Vec<String> {
    types.iter().map(|t| t.to_string()).collect()
}

fn extractor() -> ParameterExtractor {
    ParameterExtractor::new(PatternTable::builtin())
}

#[test]
fn every_builtin_type_resolves_a_literal_match() {
    let cases = [
        ("voltage", "220v", "220"),
        ("weight", "3.2 kg", "3.2 kg"),
        ("height", "180 cm", "180 cm"),
        ("volume", "750 ml", "750 ml"),
        ("wattage", "65 w", "65 w"),
        ("depth", "depth: 40 cm", "40 cm"),
        ("width", "width: 55 mm", "55 mm"),
        ("max_weight", "max weight: 120 kg", "120 kg"),
    ];

    let extractor = extractor();
    for (type_name, literal, expected) in cases {
        let result = extractor.extract(&spans(&[literal]), &requested(&[type_name]));
        let parameter = result
            .get(type_name)
            .unwrap_or_else(|| panic!("{type_name} should resolve from '{literal}'"));
        assert_eq!(parameter.render(), expected, "type {type_name}");
    }
}

#[test]
fn first_match_wins_is_order_sensitive() {
    let forward = extractor().extract(&spans(&["10 kg", "99 kg"]), &requested(&["weight"]));
    let reverse = extractor().extract(&spans(&["99 kg", "10 kg"]), &requested(&["weight"]));

    assert_eq!(forward.get("weight").unwrap().value, "10");
    assert_eq!(reverse.get("weight").unwrap().value, "99");
}

#[test]
fn case_insensitive_resolution_is_identical() {
    let upper = extractor().extract(&spans(&["120V"]), &requested(&["voltage"]));
    let lower = extractor().extract(&spans(&["120v"]), &requested(&["voltage"]));
    assert_eq!(upper.get("voltage"), lower.get("voltage"));
}

#[test]
fn absent_pattern_type_yields_absent_never_panics() {
    let result = extractor().extract(&spans(&["5 kg"]), &requested(&["airflow"]));
    assert!(result.is_empty());
}

#[test]
fn empty_stream_yields_nothing() {
    let result = extractor().extract(&[], &requested(&["weight", "voltage", "depth"]));
    assert!(result.is_empty());
}

#[test]
fn weight_scenario_from_mixed_stream() {
    let stream = spans(&["package weight 2.5kg net", "other text"]);
    let result = extractor().extract(&stream, &requested(&["weight"]));
    assert_eq!(result.get("weight").unwrap().render(), "2.5 kg");
}

/// Region spans come first in the fused stream, so a region match beats a
/// full-page match for the same type even when the page engine also saw it.
#[test]
fn fused_region_evidence_beats_page_evidence() {
    struct OneRegion;

    impl RegionReader for OneRegion {
        fn read_regions(&self, _image: &PreprocessedImage) -> anyhow::Result<Vec<RegionText>> {
            Ok(vec![RegionText {
                bbox: TextBox {
                    x: 0.0,
                    y: 0.0,
                    width: 20.0,
                    height: 10.0,
                    score: 0.9,
                },
                text: "net 2 kg".to_string(),
                confidence: 0.9,
            }])
        }
    }

    let detector = TextDetector::new(
        Arc::new(OneRegion),
        Arc::new(FixedPage("gross 7 kg".to_string())),
    );

    let image = preprocess(&DynamicImage::new_rgb8(32, 32));
    let stream = detector.detect(&image);
    assert_eq!(stream.len(), 2);

    let result = extractor().extract(&stream, &requested(&["weight"]));
    assert_eq!(result.get("weight").unwrap().value, "2");
}

#[test]
fn substitute_table_changes_resolution() {
    let table = PatternTable::from_entries(
        "alt-1",
        vec![(
            "weight".to_string(),
            r"(\d+)\s*(stone)\b".to_string(),
            GroupLayout::ValueAndUnit,
        )],
    )
    .unwrap();
    let extractor = ParameterExtractor::new(table);

    let metric = extractor.extract(&spans(&["5 kg"]), &requested(&["weight"]));
    assert!(metric.is_empty());

    let imperial = extractor.extract(&spans(&["11 stone"]), &requested(&["weight"]));
    assert_eq!(imperial.get("weight").unwrap().render(), "11 stone");
}
