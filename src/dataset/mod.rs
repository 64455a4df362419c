// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Dataset I/O: chunked CSV input and the predictions output column
//!
//! Input rows need at least `image_link` and `entity_name`; extra columns
//! are ignored. Reading is streaming and chunked so a run never holds more
//! than one chunk of rows in memory.

use anyhow::{Context, Result};
use csv::DeserializeRecordsIntoIter;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

/// One dataset row
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetRow {
    /// Product image URL
    pub image_link: String,
    /// Key into the entity -> parameter-type mapping
    pub entity_name: String,
}

/// Streaming chunked reader over the input CSV
pub struct DatasetReader {
    records: DeserializeRecordsIntoIter<File, DatasetRow>,
}

impl DatasetReader {
    /// Open the input dataset
    pub fn open(path: &Path) -> Result<Self> {
        let reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open dataset {}", path.display()))?;

        Ok(Self {
            records: reader.into_deserialize(),
        })
    }

    /// Read up to `size` rows; an empty vec means the dataset is exhausted
    ///
    /// A malformed row is a dataset error, not a row-level processing
    /// failure, and aborts the run.
    pub fn next_chunk(&mut self, size: usize) -> Result<Vec<DatasetRow>> {
        let mut rows = Vec::with_capacity(size.min(1024));

        while rows.len() < size {
            match self.records.next() {
                Some(record) => rows.push(record.context("malformed dataset row")?),
                None => break,
            }
        }

        Ok(rows)
    }
}

/// Write the single-column predictions file, one row per input row
pub fn write_predictions(path: &Path, predictions: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output dir {}", parent.display()))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open output {}", path.display()))?;

    writer.write_record(["predictions"])?;
    for prediction in predictions {
        writer.write_record([prediction.as_str()])?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dataset_file(rows: &[(&str, &str)]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "index,image_link,entity_name,group_id").unwrap();
        for (i, (link, entity)) in rows.iter().enumerate() {
            writeln!(file, "{i},{link},{entity},748919").unwrap();
        }
        file
    }

    #[test]
    fn test_chunked_reading_preserves_order() {
        let file = dataset_file(&[
            ("https://example.com/a.jpg", "item_weight"),
            ("https://example.com/b.jpg", "voltage"),
            ("https://example.com/c.jpg", "height"),
        ]);

        let mut reader = DatasetReader::open(file.path()).unwrap();
        let chunk = reader.next_chunk(2).unwrap();
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk[0].entity_name, "item_weight");
        assert_eq!(chunk[1].entity_name, "voltage");

        let rest = reader.next_chunk(2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].image_link, "https://example.com/c.jpg");

        assert!(reader.next_chunk(2).unwrap().is_empty());
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let file = dataset_file(&[("https://example.com/a.jpg", "wattage")]);
        let mut reader = DatasetReader::open(file.path()).unwrap();
        let chunk = reader.next_chunk(10).unwrap();
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk[0].entity_name, "wattage");
    }

    #[test]
    fn test_missing_required_column_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "image_link").unwrap();
        writeln!(file, "https://example.com/a.jpg").unwrap();

        let mut reader = DatasetReader::open(file.path()).unwrap();
        assert!(reader.next_chunk(1).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        assert!(DatasetReader::open(Path::new("/nonexistent/test.csv")).is_err());
    }

    #[test]
    fn test_write_predictions_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/predictions.csv");

        let predictions = vec![
            "2.5 kg".to_string(),
            "No result".to_string(),
            "120".to_string(),
        ];
        write_predictions(&path, &predictions).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "predictions");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "2.5 kg");
        assert_eq!(lines[2], "No result");
    }
}
