//! Scenario definitions.
//!
//! Each scenario is a named configuration of sheets and a detector model.
//! All scenarios are deterministic given the same seed.

use crate::{
    detector_sim::{DetectorParams, DetectorSimulator},
    replay::ReplayLog,
    sheet::{MotionSpec, Sheet},
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// 12 sheets in single file on a conveyor, clean detector
    Conveyor,
    /// 10 sheets dropped one after another onto the same stack position
    Stacking,
    /// 40 sheets on a wide belt in four lanes at different speeds, moderate clutter
    Dense,
    /// Conveyor with a flaky detector: frequent misses and false positives
    Flicker,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    /// Number of frames to simulate
    pub frames: u64,
    pub sheets: Vec<Sheet>,
    pub detector: DetectorParams,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::Conveyor => Self::conveyor(seed),
            ScenarioKind::Stacking => Self::stacking(seed),
            ScenarioKind::Dense => Self::dense(seed),
            ScenarioKind::Flicker => Self::flicker(seed),
        }
    }

    /// Simulate every frame and record the detector output with ground truth.
    pub fn record(&self) -> ReplayLog {
        let mut sheets = self.sheets.clone();
        let mut detector = DetectorSimulator::new(self.detector.clone(), self.seed);
        let mut seen = BTreeSet::new();
        let mut frames = Vec::with_capacity(self.frames as usize);

        for frame in 1..=self.frames {
            for sheet in &mut sheets {
                sheet.step(frame);
            }
            let record = detector.generate(&sheets, frame);
            seen.extend(record.ground_truth.iter().map(|g| g.sheet_id));
            frames.push(record);
        }

        ReplayLog {
            scenario_name: self.name.clone(),
            seed: self.seed,
            true_count: seen.len(),
            frames,
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 1: Conveyor
    // -----------------------------------------------------------------------
    fn conveyor(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));

        // Sheets enter at the left edge, one every 25 frames, and leave
        // once past the right edge. One belt speed for all of them.
        let speed = 10.0 + rng.gen::<f64>() * 2.0;
        let sheets = (0..12)
            .map(|i| {
                let appear = 1 + i * 25;
                let w = 180.0 + rng.gen::<f64>() * 40.0;
                let travel = ((1280.0 + w) / speed).ceil() as u64;
                Sheet::new(i, [-w / 2.0 - speed * (appear - 1) as f64, 360.0], [speed, 0.0], [w, 140.0])
                    .visible_between(Some(appear), Some(appear + travel))
            })
            .collect();

        Scenario {
            name: "conveyor".into(),
            seed,
            frames: 450,
            sheets,
            detector: DetectorParams::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 2: Stacking
    // -----------------------------------------------------------------------
    fn stacking(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(2));

        // Each sheet falls for 30 frames, lands on the stack and is hidden
        // by the next sheet when that one lands
        let period = 50u64;
        let fall = 30u64;
        let sheets = (0..10)
            .map(|i| {
                let appear = 1 + i * period;
                let land = appear + fall;
                let vy = 12.0;
                let cx = 640.0 + (rng.gen::<f64>() - 0.5) * 20.0;
                let cy_land = 600.0;
                let cy_start = cy_land - vy * (land - 1) as f64;
                Sheet::new(i, [cx, cy_start], [0.0, vy], [300.0, 60.0])
                    .with_motion(MotionSpec::Segmented {
                        segments: vec![
                            (0, Box::new(MotionSpec::ConstantVelocity)),
                            (land, Box::new(MotionSpec::Stationary)),
                        ],
                    })
                    .visible_between(Some(appear), Some(land + period))
            })
            .collect();

        Scenario {
            name: "stacking".into(),
            seed,
            frames: 10 * period + fall,
            sheets,
            detector: DetectorParams {
                lambda_clutter: 0.0,
                ..Default::default()
            },
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 3: Dense — four lanes
    // -----------------------------------------------------------------------
    fn dense(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(3));

        let lane_speeds: Vec<f64> = (0..4).map(|_| 8.0 + rng.gen::<f64>() * 4.0).collect();
        let sheets = (0..40)
            .map(|i| {
                let lane = (i % 4) as usize;
                let speed = lane_speeds[lane];
                // At least 30 frames apart within a lane, so sheets never touch
                let appear = 1 + (i / 4) * 35 + rng.gen_range(0u64..5);
                let w = 160.0 + rng.gen::<f64>() * 40.0;
                let cy = 110.0 + lane as f64 * 170.0;
                let travel = ((1280.0 + w) / speed).ceil() as u64;
                Sheet::new(i, [-w / 2.0 - speed * (appear - 1) as f64, cy], [speed, 0.0], [w, 130.0])
                    .visible_between(Some(appear), Some(appear + travel))
            })
            .collect();

        Scenario {
            name: "dense".into(),
            seed,
            frames: 500,
            sheets,
            detector: DetectorParams {
                p_detection: 0.9,
                lambda_clutter: 0.3,
                ..Default::default()
            },
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 4: Flicker
    // -----------------------------------------------------------------------
    fn flicker(seed: u64) -> Self {
        let base = Self::conveyor(seed);
        Scenario {
            name: "flicker".into(),
            detector: DetectorParams {
                p_detection: 0.7,
                center_jitter: 5.0,
                size_jitter: 8.0,
                lambda_clutter: 0.5,
                ..Default::default()
            },
            ..base
        }
    }
}
