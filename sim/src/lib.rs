//! `sim` — Sheet simulator: trajectories, detector output, replay logs.

pub mod detector_sim;
pub mod replay;
pub mod scenarios;
pub mod sheet;

pub use detector_sim::{DetectorParams, DetectorSimulator};
pub use replay::{load_replay, save_replay, FrameRecord, ReplayLog};
pub use scenarios::{Scenario, ScenarioKind};
pub use sheet::{MotionSpec, Sheet};
