// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Command-line surface for batch extraction runs

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use crate::batch::BatchOrchestrator;
use crate::config::{EntityMapping, ModelPaths, PipelineConfig};
use crate::extract::{ParameterExtractor, PatternTable};
use crate::fetch::HttpImageStore;
use crate::version;
use crate::vision::ocr::{FullPageOcrEngine, RegionOcrEngine, TextDetector};

/// Extract measurement attributes from product images listed in a dataset
#[derive(Parser, Debug)]
#[command(name = "catalog-ocr", version = version::VERSION_NUMBER)]
pub struct Cli {
    /// Input dataset CSV (needs image_link and entity_name columns)
    #[arg(long, env = "CATALOG_OCR_INPUT")]
    pub input: PathBuf,

    /// Output predictions CSV
    #[arg(long, env = "CATALOG_OCR_OUTPUT", default_value = "predictions.csv")]
    pub output: PathBuf,

    /// Directory fetched image bytes are persisted under
    #[arg(long, env = "CATALOG_OCR_IMAGE_DIR", default_value = "images")]
    pub image_dir: PathBuf,

    /// Rows per streaming chunk
    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    /// Concurrently in-flight rows
    #[arg(long, default_value_t = 10)]
    pub workers: usize,

    /// HTTP timeout for one image fetch, in seconds
    #[arg(long, default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    /// Hard per-row pipeline timeout, in seconds
    #[arg(long, default_value_t = 120)]
    pub row_timeout_secs: u64,

    /// Region engine detection model (ONNX)
    #[arg(long, env = "CATALOG_OCR_DET_MODEL", default_value = "models/ocr/det_model.onnx")]
    pub det_model: PathBuf,

    /// Region engine recognition model (ONNX)
    #[arg(long, env = "CATALOG_OCR_REC_MODEL", default_value = "models/ocr/rec_model.onnx")]
    pub rec_model: PathBuf,

    /// Full-page transcription model (ONNX)
    #[arg(long, env = "CATALOG_OCR_PAGE_MODEL", default_value = "models/ocr/page_model.onnx")]
    pub page_model: PathBuf,

    /// Character dictionary shared by both recognizers
    #[arg(long, env = "CATALOG_OCR_DICT", default_value = "models/ocr/keys.txt")]
    pub dictionary: PathBuf,

    /// Substitute parameter-pattern table (JSON); builtin table if omitted
    #[arg(long)]
    pub pattern_table: Option<PathBuf>,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            chunk_size: self.chunk_size,
            worker_slots: self.workers,
            fetch_timeout_secs: self.fetch_timeout_secs,
            row_timeout_secs: self.row_timeout_secs,
            image_dir: self.image_dir.clone(),
        }
    }

    fn model_paths(&self) -> ModelPaths {
        ModelPaths {
            detection_model: self.det_model.clone(),
            recognition_model: self.rec_model.clone(),
            fullpage_model: self.page_model.clone(),
            dictionary: self.dictionary.clone(),
        }
    }
}

/// Wire services together and run the batch
pub async fn execute(cli: Cli) -> Result<()> {
    println!("🚀 {}", version::get_version_string());

    let config = cli.pipeline_config();
    let models = cli.model_paths();

    let fetcher = Arc::new(
        HttpImageStore::new(config.image_dir.clone(), config.fetch_timeout_secs).await?,
    );

    println!("🧠 Loading recognition engines (CPU-only)...");
    let region = RegionOcrEngine::load(
        &models.detection_model,
        &models.recognition_model,
        &models.dictionary,
    )?;
    let fullpage = FullPageOcrEngine::load(&models.fullpage_model, &models.dictionary)?;
    let detector = Arc::new(TextDetector::new(Arc::new(region), Arc::new(fullpage)));
    println!("✅ Engines ready");

    let table = match &cli.pattern_table {
        Some(path) => PatternTable::from_json_file(path)?,
        None => PatternTable::builtin(),
    };
    println!("📐 Pattern table {} ({} types)", table.version(), table.len());

    let extractor = Arc::new(ParameterExtractor::new(table));
    let orchestrator = BatchOrchestrator::new(
        fetcher,
        detector,
        extractor,
        EntityMapping::default(),
        config,
    );

    let summary = orchestrator.run(&cli.input, &cli.output).await?;

    println!(
        "✅ {} rows: {} resolved, {} no-match, {} failed -> {}",
        summary.rows,
        summary.resolved,
        summary.no_match,
        summary.failed,
        cli.output.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["catalog-ocr", "--input", "test.csv"]);
        assert_eq!(cli.chunk_size, 1000);
        assert_eq!(cli.workers, 10);
        assert_eq!(cli.output, PathBuf::from("predictions.csv"));
        assert!(cli.pattern_table.is_none());
    }

    #[test]
    fn test_cli_config_mapping() {
        let cli = Cli::parse_from([
            "catalog-ocr",
            "--input",
            "test.csv",
            "--workers",
            "4",
            "--row-timeout-secs",
            "30",
        ]);
        let config = cli.pipeline_config();
        assert_eq!(config.worker_slots, 4);
        assert_eq!(config.row_timeout_secs, 30);
    }
}
