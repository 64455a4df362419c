// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text region detection for the region engine
//!
//! Runs the detection ONNX model over the square detection tensor and turns
//! the resulting probability map into ranked bounding boxes via connected
//! component extraction.

use anyhow::{Context, Result};
use ndarray::{Array4, ArrayViewD, IxDyn};
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::build_cpu_session;

/// Minimum connected-component pixel count for a region to count as text
const MIN_REGION_PIXELS: usize = 10;

/// A detected text box in detection-input space
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    /// X coordinate of top-left corner
    pub x: f32,
    /// Y coordinate of top-left corner
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
    /// Mean text probability over the region (0.0-1.0)
    pub score: f32,
}

impl TextBox {
    /// Check if this text box has usable dimensions
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.score > 0.0
    }
}

/// Text region detection model
///
/// The session is constructed once and shared read-only; the inner mutex
/// serializes inference calls from concurrent batch workers.
#[derive(Clone)]
pub struct RegionDetector {
    session: Arc<Mutex<ort::session::Session>>,
    input_name: String,
    score_threshold: f32,
}

impl std::fmt::Debug for RegionDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionDetector")
            .field("input_name", &self.input_name)
            .field("score_threshold", &self.score_threshold)
            .finish_non_exhaustive()
    }
}

impl RegionDetector {
    /// Load the detection model from an ONNX file
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = build_cpu_session(model_path.as_ref())?;
        let input_name = super::session_input_name(&session, "x");

        debug!("region detection model loaded - input: {}", input_name);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            score_threshold: 0.3,
        })
    }

    /// Set the probability threshold for text pixels
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Detect text regions in a preprocessed detection tensor
    ///
    /// Returns boxes ranked top-to-bottom, then left-to-right - the region
    /// engine's internal ranking, which downstream fusion preserves.
    pub fn detect(&self, input: &Array4<f32>) -> Result<Vec<TextBox>> {
        let shape = input.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("detection session poisoned"))?;

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Detection inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let boxes = self.extract_boxes(output_tensor.view(), shape[2], shape[3])?;
        debug!("detected {} text regions", boxes.len());

        Ok(boxes)
    }

    /// Turn the probability map into bounding boxes
    ///
    /// The model outputs [1, 1, H, W] (or [1, H, W]) where each value is the
    /// probability of the pixel belonging to text. Connected components of
    /// above-threshold pixels become boxes; components smaller than
    /// MIN_REGION_PIXELS are noise and dropped.
    fn extract_boxes(
        &self,
        output: ArrayViewD<f32>,
        input_height: usize,
        input_width: usize,
    ) -> Result<Vec<TextBox>> {
        let output_shape = output.shape();
        if output_shape.len() < 3 {
            anyhow::bail!("Unexpected detection output shape: {:?}", output_shape);
        }

        let (prob_height, prob_width) = if output_shape.len() == 4 {
            (output_shape[2], output_shape[3])
        } else {
            (output_shape[1], output_shape[2])
        };

        let scale_y = input_height as f32 / prob_height as f32;
        let scale_x = input_width as f32 / prob_width as f32;

        let probe = ProbMap {
            output: &output,
            is_4d: output_shape.len() == 4,
        };

        let mut visited = vec![false; prob_width * prob_height];
        let mut boxes = Vec::new();

        for y in 0..prob_height {
            for x in 0..prob_width {
                if visited[y * prob_width + x] || probe.at(x, y) < self.score_threshold {
                    continue;
                }

                let component = flood_fill(
                    &probe,
                    &mut visited,
                    (x, y),
                    (prob_width, prob_height),
                    self.score_threshold,
                );

                if component.count < MIN_REGION_PIXELS {
                    continue;
                }

                boxes.push(TextBox {
                    x: component.min_x as f32 * scale_x,
                    y: component.min_y as f32 * scale_y,
                    width: (component.max_x - component.min_x + 1) as f32 * scale_x,
                    height: (component.max_y - component.min_y + 1) as f32 * scale_y,
                    score: component.score_sum / component.count as f32,
                });
            }
        }

        // Engine ranking: top-to-bottom, then left-to-right
        boxes.sort_by(|a, b| {
            a.y.partial_cmp(&b.y)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
        });

        Ok(boxes)
    }
}

/// Shape-agnostic view into the probability map
struct ProbMap<'a, 'd> {
    output: &'a ArrayViewD<'d, f32>,
    is_4d: bool,
}

impl ProbMap<'_, '_> {
    fn at(&self, x: usize, y: usize) -> f32 {
        if self.is_4d {
            self.output[IxDyn(&[0, 0, y, x])]
        } else {
            self.output[IxDyn(&[0, y, x])]
        }
    }
}

/// One connected component of above-threshold pixels
struct Component {
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
    count: usize,
    score_sum: f32,
}

/// 4-connected flood fill from a seed pixel
fn flood_fill(
    probe: &ProbMap<'_, '_>,
    visited: &mut [bool],
    seed: (usize, usize),
    dims: (usize, usize),
    threshold: f32,
) -> Component {
    let (width, height) = dims;
    let mut component = Component {
        min_x: seed.0,
        max_x: seed.0,
        min_y: seed.1,
        max_y: seed.1,
        count: 0,
        score_sum: 0.0,
    };

    let mut stack = vec![seed];
    while let Some((x, y)) = stack.pop() {
        if x >= width || y >= height || visited[y * width + x] {
            continue;
        }

        let prob = probe.at(x, y);
        if prob < threshold {
            continue;
        }

        visited[y * width + x] = true;
        component.count += 1;
        component.score_sum += prob;
        component.min_x = component.min_x.min(x);
        component.max_x = component.max_x.max(x);
        component.min_y = component.min_y.min(y);
        component.max_y = component.max_y.max(y);

        if x > 0 {
            stack.push((x - 1, y));
        }
        if x + 1 < width {
            stack.push((x + 1, y));
        }
        if y > 0 {
            stack.push((x, y - 1));
        }
        if y + 1 < height {
            stack.push((x, y + 1));
        }
    }

    component
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn test_text_box_validity() {
        let valid = TextBox {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
            score: 0.95,
        };
        assert!(valid.is_valid());

        let flat = TextBox {
            width: 0.0,
            ..valid.clone()
        };
        assert!(!flat.is_valid());
    }

    #[test]
    fn test_flood_fill_finds_block() {
        // 8x8 map with a 3x3 hot block at (2,2)
        let mut map = Array::zeros(IxDyn(&[1, 1, 8, 8]));
        for y in 2..5 {
            for x in 2..5 {
                map[IxDyn(&[0, 0, y, x])] = 0.9;
            }
        }
        let view = map.view();
        let probe = ProbMap {
            output: &view,
            is_4d: true,
        };
        let mut visited = vec![false; 64];
        let component = flood_fill(&probe, &mut visited, (2, 2), (8, 8), 0.5);

        assert_eq!(component.count, 9);
        assert_eq!((component.min_x, component.max_x), (2, 4));
        assert_eq!((component.min_y, component.max_y), (2, 4));
        assert!((component.score_sum - 8.1).abs() < 1e-3);
    }

    #[test]
    fn test_flood_fill_respects_threshold() {
        let mut map = Array::zeros(IxDyn(&[1, 1, 4, 4]));
        map[IxDyn(&[0, 0, 0, 0])] = 0.2;
        let view = map.view();
        let probe = ProbMap {
            output: &view,
            is_4d: true,
        };
        let mut visited = vec![false; 16];
        let component = flood_fill(&probe, &mut visited, (0, 0), (4, 4), 0.5);
        assert_eq!(component.count, 0);
    }

    #[test]
    fn test_probe_3d_indexing() {
        let mut map = Array::zeros(IxDyn(&[1, 4, 4]));
        map[IxDyn(&[0, 1, 2])] = 0.7;
        let view = map.view();
        let probe = ProbMap {
            output: &view,
            is_4d: false,
        };
        assert!((probe.at(2, 1) - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_missing_model() {
        let result = RegionDetector::load("/nonexistent/det_model.onnx");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }
}
