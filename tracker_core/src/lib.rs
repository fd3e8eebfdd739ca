//! `tracker_core` — SORT-style multi-object tracking for counting sheets.
//!
//! # Module layout
//! - [`types`]        — Boxes, detections, reported objects, track IDs
//! - [`kf`]           — Constant-velocity Kalman filter over box state
//! - [`track`]        — Single-track lifecycle counters
//! - [`association`]  — IoU cost matrix, Hungarian and greedy matchers
//! - [`registry`]     — Birth / confirmation / deletion of tracks
//! - [`pipeline`]     — Per-stream tracker facade
//! - [`counting`]     — Counted-id set on top of tracker output
//! - [`metrics`]      — Precision/recall, ID switches, duplicate ids
//! - [`error`]        — Error type

pub mod association;
pub mod counting;
pub mod error;
pub mod kf;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod track;
pub mod types;

pub use association::{GreedyMatcher, Matcher, MatcherKind, OptimalMatcher};
pub use counting::SheetCounter;
pub use error::TrackerError;
pub use kf::KfConfig;
pub use metrics::{GroundTruth, MetricsSummary, TrackingMetrics};
pub use pipeline::{FrameOutput, Tracker, TrackerConfig};
pub use registry::{FrameStats, RegistryConfig};
pub use track::{Track, TrackStatus};
pub use types::{BBox, Detection, StateCov, StateVec, TrackId, TrackedObject};
