// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded-concurrency batch orchestration
//!
//! Chunks are drained strictly one at a time; within a chunk, rows run
//! concurrently under a worker pool sized at construction and reused for
//! the whole run. Output order is reconstructed by row index, never by
//! completion order. Row failures degrade that row's result only - the
//! orchestrator itself fails for dataset/output I/O alone.

use anyhow::{Context, Result};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::outcome::{BatchResult, RowError, RowOutcome, RowStage};
use crate::config::{EntityMapping, PipelineConfig};
use crate::dataset::{self, DatasetReader, DatasetRow};
use crate::extract::ParameterExtractor;
use crate::fetch::ImageFetcher;
use crate::vision::{decode_image_bytes, preprocess, TextDetector};

/// Outcome counts for a finished run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub rows: usize,
    pub resolved: usize,
    pub no_match: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn absorb(&mut self, results: &[BatchResult]) {
        for result in results {
            self.rows += 1;
            match result.outcome {
                RowOutcome::Resolved(_) => self.resolved += 1,
                RowOutcome::NoMatch => self.no_match += 1,
                RowOutcome::Failed(_) => self.failed += 1,
            }
        }
    }
}

/// Drives acquisition -> preprocessing -> detection -> extraction per row
///
/// All services are injected, constructed once, and shared read-only across
/// workers.
pub struct BatchOrchestrator {
    fetcher: Arc<dyn ImageFetcher>,
    detector: Arc<TextDetector>,
    extractor: Arc<ParameterExtractor>,
    mapping: EntityMapping,
    config: PipelineConfig,
    workers: Arc<Semaphore>,
}

impl BatchOrchestrator {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        detector: Arc<TextDetector>,
        extractor: Arc<ParameterExtractor>,
        mapping: EntityMapping,
        config: PipelineConfig,
    ) -> Self {
        // The pool lives as long as the orchestrator; chunks only submit
        // fresh tasks to it.
        let workers = Arc::new(Semaphore::new(config.worker_slots.max(1)));

        Self {
            fetcher,
            detector,
            extractor,
            mapping,
            config,
            workers,
        }
    }

    /// Process a whole dataset and write the predictions file
    pub async fn run(&self, input: &Path, output: &Path) -> Result<BatchSummary> {
        let mut reader = DatasetReader::open(input)?;
        let mut predictions: Vec<String> = Vec::new();
        let mut summary = BatchSummary::default();
        let mut chunk_index = 0usize;

        loop {
            let rows = reader.next_chunk(self.config.chunk_size)?;
            if rows.is_empty() {
                break;
            }

            info!(chunk = chunk_index, rows = rows.len(), "processing chunk");
            let results = self.process_chunk(rows, predictions.len()).await?;

            let mut chunk_summary = BatchSummary::default();
            chunk_summary.absorb(&results);
            info!(
                chunk = chunk_index,
                resolved = chunk_summary.resolved,
                no_match = chunk_summary.no_match,
                failed = chunk_summary.failed,
                "chunk complete"
            );
            summary.absorb(&results);

            predictions.extend(results.into_iter().map(|r| r.outcome.into_prediction()));
            chunk_index += 1;
        }

        dataset::write_predictions(output, &predictions)
            .with_context(|| format!("failed to write predictions to {}", output.display()))?;

        info!(
            rows = summary.rows,
            resolved = summary.resolved,
            no_match = summary.no_match,
            failed = summary.failed,
            "batch complete"
        );

        Ok(summary)
    }

    /// Process one chunk of rows under the worker pool
    ///
    /// Returns one result per row, reassembled by index correlation: tasks
    /// report their absolute row index and the results vector is filled by
    /// that index, so completion order is irrelevant.
    pub async fn process_chunk(
        &self,
        rows: Vec<DatasetRow>,
        base_index: usize,
    ) -> Result<Vec<BatchResult>> {
        let row_count = rows.len();
        let progress = ProgressBar::new(row_count as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .expect("static progress template"),
        );
        progress.set_message("rows");

        let mut handles = Vec::with_capacity(row_count);
        for (offset, row) in rows.into_iter().enumerate() {
            let permit = self
                .workers
                .clone()
                .acquire_owned()
                .await
                .context("worker pool closed")?;

            let row_index = base_index + offset;
            let parameter_type = self.mapping.resolve(&row.entity_name);
            let fetcher = Arc::clone(&self.fetcher);
            let detector = Arc::clone(&self.detector);
            let extractor = Arc::clone(&self.extractor);
            let timeout_secs = self.config.row_timeout_secs;
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;

                let pipeline = process_row(
                    fetcher.as_ref(),
                    &detector,
                    &extractor,
                    &row.image_link,
                    &parameter_type,
                );

                let outcome =
                    match tokio::time::timeout(Duration::from_secs(timeout_secs), pipeline).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(
                                row = row_index,
                                url = %row.image_link,
                                "row stalled past {timeout_secs}s, converting to failure"
                            );
                            RowOutcome::Failed(RowError::Timeout {
                                seconds: timeout_secs,
                            })
                        }
                    };

                if let RowOutcome::Failed(ref err) = outcome {
                    debug!(row = row_index, url = %row.image_link, "row failed: {err}");
                }

                progress.inc(1);
                (row_index, outcome)
            }));
        }

        // Reassemble strictly by reported row index
        let mut slots: Vec<Option<RowOutcome>> = Vec::with_capacity(row_count);
        slots.resize_with(row_count, || None);

        for (offset, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok((row_index, outcome)) => slots[row_index - base_index] = Some(outcome),
                Err(err) => {
                    error!(row = base_index + offset, "row worker died: {err}");
                    slots[offset] = Some(RowOutcome::Failed(RowError::Worker(err.to_string())));
                }
            }
        }

        progress.finish_and_clear();

        Ok(slots
            .into_iter()
            .enumerate()
            .map(|(offset, outcome)| BatchResult {
                row_index: base_index + offset,
                outcome: outcome.unwrap_or_else(|| {
                    RowOutcome::Failed(RowError::Worker("missing row outcome".to_string()))
                }),
            })
            .collect())
    }
}

/// One row's pipeline: acquire -> preprocess -> detect -> extract
///
/// Every error is converted to a terminal outcome here; nothing escapes to
/// the chunk loop.
async fn process_row(
    fetcher: &dyn ImageFetcher,
    detector: &TextDetector,
    extractor: &ParameterExtractor,
    image_link: &str,
    parameter_type: &str,
) -> RowOutcome {
    debug!(stage = %RowStage::Acquiring, url = image_link, "row advancing");
    let bytes = match fetcher.fetch(image_link).await {
        Ok(bytes) => bytes,
        Err(err) => return RowOutcome::Failed(RowError::Acquisition(err)),
    };

    debug!(stage = %RowStage::Preprocessing, url = image_link, "row advancing");
    let raw = match decode_image_bytes(&bytes) {
        Ok((image, _info)) => image,
        Err(err) => return RowOutcome::Failed(RowError::Decode(err)),
    };
    let preprocessed = preprocess(&raw);

    debug!(stage = %RowStage::Detecting, url = image_link, "row advancing");
    let spans = detector.detect(&preprocessed);

    debug!(stage = %RowStage::Extracting, url = image_link, "row advancing");
    let requested = [parameter_type.to_string()];
    let mut resolved = extractor.extract(&spans, &requested);

    match resolved.remove(&parameter_type.to_lowercase()) {
        Some(parameter) => RowOutcome::Resolved(parameter),
        None => RowOutcome::NoMatch,
    }
}
