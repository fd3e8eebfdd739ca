//! Replay: serialize/deserialize detection logs for offline runs.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracker_core::metrics::GroundTruth;
use tracker_core::types::Detection;

/// A full recorded detection log of one stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayLog {
    pub scenario_name: String,
    pub seed: u64,
    /// Distinct sheets that were visible at some point
    pub true_count: usize,
    /// Frames in delivery order, indices strictly increasing
    pub frames: Vec<FrameRecord>,
}

/// Detector output and ground truth for one frame.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FrameRecord {
    pub index: u64,
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub ground_truth: Vec<GroundTruth>,
}

/// Save a replay log to a JSON file.
pub fn save_replay(log: &ReplayLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating replay file {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a replay log from a JSON file.
pub fn load_replay(path: &Path) -> anyhow::Result<ReplayLog> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening replay file {}", path.display()))?;
    let reader = BufReader::new(file);
    let log: ReplayLog = serde_json::from_reader(reader)
        .with_context(|| format!("parsing replay file {}", path.display()))?;
    Ok(log)
}
