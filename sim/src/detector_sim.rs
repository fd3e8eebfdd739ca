//! Detector simulator.
//!
//! Generates per-frame detector output with:
//! - Uniform box jitter on center and size
//! - Miss probability (1 - p_detection)
//! - Poisson clutter (false positives) anywhere in the frame
//! - Confidence scores drawn per detection

use crate::{replay::FrameRecord, sheet::Sheet};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracker_core::metrics::GroundTruth;
use tracker_core::types::{BBox, Detection};

/// Detector noise model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Probability a visible sheet is detected in a frame
    pub p_detection: f64,
    /// Half-width of the uniform center jitter (px)
    pub center_jitter: f64,
    /// Half-width of the uniform width/height jitter (px)
    pub size_jitter: f64,
    /// Mean number of false positives per frame
    pub lambda_clutter: f64,
    /// Image [width, height] in pixels
    pub frame_size: [f64; 2],
    /// [min, max] score of true detections
    pub score_range: [f64; 2],
    /// [min, max] score of clutter
    pub clutter_score_range: [f64; 2],
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            p_detection: 0.95,
            center_jitter: 2.0,
            size_jitter: 3.0,
            lambda_clutter: 0.05,
            frame_size: [1280.0, 720.0],
            score_range: [0.6, 0.99],
            clutter_score_range: [0.3, 0.6],
        }
    }
}

/// Generates detections from a set of sheets.
pub struct DetectorSimulator {
    pub params: DetectorParams,
    rng: ChaCha8Rng,
}

impl DetectorSimulator {
    pub fn new(params: DetectorParams, seed: u64) -> Self {
        Self {
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn uniform(&mut self, half_width: f64) -> f64 {
        self.rng.gen::<f64>() * half_width * 2.0 - half_width
    }

    fn score(&mut self, range: [f64; 2]) -> f64 {
        range[0] + self.rng.gen::<f64>() * (range[1] - range[0])
    }

    /// Produce the detector output and ground truth for `frame`.
    pub fn generate(&mut self, sheets: &[Sheet], frame: u64) -> FrameRecord {
        let mut detections = Vec::new();
        let mut ground_truth = Vec::new();

        // True detections
        for sheet in sheets {
            if !sheet.is_active(frame) {
                continue;
            }
            ground_truth.push(GroundTruth {
                sheet_id: sheet.id,
                bbox: sheet.bbox(),
            });

            // Miss detection?
            if self.rng.gen::<f64>() > self.params.p_detection {
                continue;
            }

            let cx = sheet.center[0] + self.uniform(self.params.center_jitter);
            let cy = sheet.center[1] + self.uniform(self.params.center_jitter);
            let w = (sheet.size[0] + self.uniform(self.params.size_jitter)).max(1.0);
            let h = (sheet.size[1] + self.uniform(self.params.size_jitter)).max(1.0);
            let score = self.score(self.params.score_range);
            detections.push(Detection {
                bbox: BBox::from_center(cx, cy, w, h),
                score,
            });
        }

        // Clutter (Poisson): count draws until the running product of
        // uniforms falls below e^{-lambda}
        let lambda = self.params.lambda_clutter;
        let n_clutter = if lambda <= 0.0 {
            0usize
        } else {
            let mut n = 0usize;
            let threshold = (-lambda).exp();
            let mut prod = self.rng.gen::<f64>();
            while prod > threshold && n < 50 {
                prod *= self.rng.gen::<f64>();
                n += 1;
            }
            n
        };
        let [fw, fh] = self.params.frame_size;
        for _ in 0..n_clutter {
            let w = 20.0 + self.rng.gen::<f64>() * 100.0;
            let h = 20.0 + self.rng.gen::<f64>() * 100.0;
            let x = self.rng.gen::<f64>() * (fw - w).max(0.0);
            let y = self.rng.gen::<f64>() * (fh - h).max(0.0);
            let score = self.score(self.params.clutter_score_range);
            detections.push(Detection::new(x, y, x + w, y + h, score));
        }

        FrameRecord {
            index: frame,
            detections,
            ground_truth,
        }
    }
}
