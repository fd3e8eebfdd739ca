//! Tracker facade: the per-frame entry point for one camera stream.
//!
//! # Processing steps per frame
//! 1. Predict all live tracks one frame forward (drop non-finite ones)
//! 2. Build the IoU matrix between detections and predicted boxes
//! 3. Solve the assignment (optimal Hungarian or greedy)
//! 4. Gate matches on `iou_threshold`
//! 5. Kalman-update matched tracks
//! 6. Birth tentative tracks for unmatched detections
//! 7. Report confirmed tracks matched this frame
//! 8. Prune tracks unmatched for more than `max_age` frames
//!
//! Call [`Tracker::update`] exactly once per frame, in frame order. One
//! tracker per stream; instances share no state and may live on different
//! threads, but a single instance is driven through `&mut self`.

use crate::{
    association::{Matcher, MatcherKind},
    error::TrackerError,
    registry::{FrameStats, RegistryConfig, TrackRegistry},
    track::Track,
    types::{Detection, TrackId, TrackedObject},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for a tracker. Serialises flat, e.g.
/// `{"max_age": 30, "min_hits": 3, "iou_threshold": 0.3, "matcher": "greedy"}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    #[serde(flatten)]
    pub registry: RegistryConfig,
    /// Assignment solver
    pub matcher: MatcherKind,
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.registry.validate()
    }
}

/// Output of [`Tracker::update_frame`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    /// Confirmed objects reported this frame
    pub objects: Vec<TrackedObject>,
    pub stats: FrameStats,
    /// Wall-clock time of processing
    pub elapsed_us: u64,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// SORT tracker for one stream.
pub struct Tracker {
    config: TrackerConfig,
    registry: TrackRegistry,
    matcher: Box<dyn Matcher>,
    last_frame: Option<u64>,
}

impl Tracker {
    /// Create a tracker, rejecting invalid configuration.
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self {
            registry: TrackRegistry::new(config.registry.clone()),
            matcher: config.matcher.build(),
            config,
            last_frame: None,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Process one frame of detections and return the confirmed objects
    /// as `(box, id)`.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedObject> {
        let (objects, _) = self.registry.step(detections, self.matcher.as_ref());
        objects
    }

    /// Same as [`Tracker::update`] for raw detector rows
    /// `[x1, y1, x2, y2, score]`.
    pub fn update_rows(&mut self, rows: &[[f64; 5]]) -> Vec<TrackedObject> {
        let detections: Vec<Detection> = rows.iter().copied().map(Detection::from_row).collect();
        self.update(&detections)
    }

    /// Sequenced variant of [`Tracker::update`]. `frame_index` must strictly
    /// increase between calls; gaps are allowed but still count as a single
    /// step of the motion model.
    pub fn update_frame(
        &mut self,
        frame_index: u64,
        detections: &[Detection],
    ) -> Result<FrameOutput, TrackerError> {
        if let Some(last) = self.last_frame {
            if frame_index <= last {
                return Err(TrackerError::FrameOutOfOrder {
                    last,
                    got: frame_index,
                });
            }
        }
        self.last_frame = Some(frame_index);

        let start = Instant::now();
        let (objects, stats) = self.registry.step(detections, self.matcher.as_ref());
        Ok(FrameOutput {
            objects,
            stats,
            elapsed_us: start.elapsed().as_micros() as u64,
        })
    }

    /// All living tracks, including tentative and coasting ones.
    pub fn live_tracks(&self) -> Vec<TrackedObject> {
        self.registry.live_tracks()
    }

    /// Internal track state, for inspection.
    pub fn tracks(&self) -> &[Track] {
        self.registry.tracks()
    }

    pub fn frame_count(&self) -> u64 {
        self.registry.frame_count()
    }

    /// Drop all tracks. Ids handed out later still never repeat.
    pub fn clear(&mut self) {
        self.registry.clear();
    }

    /// Drop one track; no effect if the id is not live.
    pub fn remove_track(&mut self, id: TrackId) -> bool {
        self.registry.remove(id)
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .field("frame_count", &self.registry.frame_count())
            .field("tracks", &self.registry.tracks().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBox;
    use approx::assert_abs_diff_eq;
    use std::collections::HashSet;

    fn tracker(max_age: u32, min_hits: u32) -> Tracker {
        Tracker::new(TrackerConfig {
            registry: RegistryConfig {
                max_age,
                min_hits,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap()
    }

    fn sheet(x: f64) -> Detection {
        Detection::new(x, 100.0, x + 100.0, 200.0, 0.9)
    }

    #[test]
    fn first_update_reports_in_bootstrap() {
        let mut t = tracker(1, 3);
        let out = t.update_rows(&[[0.0, 1.5, 12.6, 25.0, 0.9]]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, TrackId(1));
        let [x1, y1, x2, y2, id] = out[0].to_row();
        assert_abs_diff_eq!(x1, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y1, 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(x2, 12.6, epsilon = 1e-6);
        assert_abs_diff_eq!(y2, 25.0, epsilon = 1e-6);
        assert_eq!(id, 1.0);
    }

    #[test]
    fn identity_stable_for_smooth_motion() {
        let mut t = tracker(30, 3);
        let mut ids = HashSet::new();
        for f in 0..40 {
            let out = t.update(&[sheet(f as f64 * 5.0)]);
            // Frames 1–3 are bootstrap, frame 4 onward the streak is ≥ 3
            assert_eq!(out.len(), 1, "frame {f}");
            ids.extend(out.iter().map(|o| o.id));
        }
        assert_eq!(ids.len(), 1, "one object must keep one id");
        assert_eq!(t.tracks().len(), 1);
    }

    #[test]
    fn reported_box_follows_object() {
        let mut t = tracker(30, 3);
        let mut last = None;
        for f in 0..20 {
            last = t.update(&[sheet(f as f64 * 8.0)]).pop();
        }
        let last = last.unwrap();
        let (cx, _) = last.bbox.center();
        assert_abs_diff_eq!(cx, 19.0 * 8.0 + 50.0, epsilon = 2.0);
    }

    #[test]
    fn ids_unique_among_simultaneous_tracks() {
        let mut t = tracker(30, 1);
        let dets = [sheet(0.0), sheet(300.0), sheet(600.0)];
        for _ in 0..5 {
            let out = t.update(&dets);
            let ids: HashSet<_> = out.iter().map(|o| o.id).collect();
            assert_eq!(ids.len(), out.len());
            assert_eq!(out.len(), 3);
        }
    }

    #[test]
    fn bootstrap_reports_single_frame_detection() {
        let mut t = tracker(30, 3);
        let out = t.update(&[sheet(100.0)]);
        assert_eq!(out.len(), 1, "frame 1 is inside the bootstrap window");
        assert_eq!(t.tracks()[0].hit_streak, 0);
        assert!(t.update(&[]).is_empty());
    }

    #[test]
    fn tentative_hidden_after_bootstrap() {
        let mut t = tracker(30, 3);
        for _ in 0..3 {
            t.update(&[]);
        }
        // frame 4: outside bootstrap, new track has streak 0
        assert!(t.update(&[sheet(0.0)]).is_empty());
        assert!(t.update(&[sheet(0.0)]).is_empty()); // streak 1
        assert!(t.update(&[sheet(0.0)]).is_empty()); // streak 2
        assert_eq!(t.update(&[sheet(0.0)]).len(), 1); // streak 3
        assert_eq!(t.live_tracks().len(), 1);
    }

    #[test]
    fn expiry_after_max_age_misses() {
        let max_age = 3;
        let mut t = tracker(max_age, 1);
        for _ in 0..5 {
            t.update(&[sheet(100.0)]);
        }
        // Coasting: not reported, but still alive through max_age misses
        for miss in 1..=max_age {
            assert!(t.update(&[]).is_empty());
            assert_eq!(t.tracks().len(), 1, "alive after {miss} misses");
            assert_eq!(t.tracks()[0].time_since_update, miss);
        }
        // One more miss: time_since_update exceeds max_age
        t.update(&[]);
        assert!(t.tracks().is_empty());
    }

    #[test]
    fn rematch_within_max_age_keeps_id() {
        let mut t = tracker(3, 1);
        for _ in 0..5 {
            t.update(&[sheet(100.0)]);
        }
        for _ in 0..3 {
            t.update(&[]);
        }
        let out = t.update(&[sheet(100.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, TrackId(1));
    }

    #[test]
    fn split_then_merge_gets_new_id() {
        let max_age = 2;
        let mut t = tracker(max_age, 3);
        let a = Detection::new(100.0, 100.0, 200.0, 200.0, 0.9);
        let mut a_id = None;
        for _ in 0..5 {
            if let Some(o) = t.update(&[a]).first() {
                a_id = Some(o.id);
            }
        }
        let a_id = a_id.unwrap();
        for _ in 0..=max_age {
            t.update(&[]);
        }
        assert!(t.tracks().is_empty());

        let mut b_ids = HashSet::new();
        for _ in 0..5 {
            b_ids.extend(t.update(&[a]).iter().map(|o| o.id));
        }
        assert_eq!(b_ids.len(), 1);
        assert!(!b_ids.contains(&a_id), "a new object must not inherit a dead id");
    }

    #[test]
    fn empty_frame_ages_tracks() {
        let mut t = tracker(30, 3);
        for f in 0..6 {
            t.update(&[sheet(f as f64)]);
        }
        let age_before = t.tracks()[0].age;
        let out = t.update(&[]);
        assert!(out.is_empty());
        assert_eq!(t.tracks()[0].age, age_before + 1);
        assert_eq!(t.tracks()[0].time_since_update, 1);
        // Born on the first frame, matched on the next five; the streak only
        // resets on the following prediction
        assert_eq!(t.tracks()[0].hit_streak, 5);
    }

    #[test]
    fn one_id_per_object_over_many_frames() {
        let mut t = tracker(5, 3);
        let mut seen = HashSet::new();
        for f in 0..100 {
            let x = 10.0 + f as f64 * 3.0;
            for o in t.update(&[Detection::new(x, 50.0, x + 120.0, 130.0, 0.8)]) {
                seen.insert(o.id);
            }
        }
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn ids_never_reused() {
        let mut t = tracker(0, 1);
        let mut all = Vec::new();
        for f in 0..10 {
            // Disjoint boxes every frame: each frame births a fresh track
            let x = f as f64 * 500.0;
            all.extend(t.live_tracks().iter().map(|o| o.id));
            t.update(&[Detection::new(x, 0.0, x + 50.0, 50.0, 0.9)]);
        }
        all.extend(t.live_tracks().iter().map(|o| o.id));
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), 10);
        assert_eq!(t.tracks()[0].id, TrackId(10));
    }

    #[test]
    fn greedy_tracker_behaves_on_separated_objects() {
        let mut t = Tracker::new(TrackerConfig {
            matcher: MatcherKind::Greedy,
            ..Default::default()
        })
        .unwrap();
        let mut ids = HashSet::new();
        for f in 0..10 {
            let dx = f as f64 * 4.0;
            for o in t.update(&[sheet(dx), sheet(400.0 + dx)]) {
                ids.insert(o.id);
            }
        }
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn frame_order_enforced() {
        let mut t = tracker(30, 3);
        t.update_frame(1, &[sheet(0.0)]).unwrap();
        let out = t.update_frame(3, &[sheet(2.0)]).unwrap();
        assert_eq!(out.stats.frame, 2);
        assert_eq!(out.stats.matches, 1);

        let err = t.update_frame(3, &[sheet(4.0)]).unwrap_err();
        assert_eq!(err, TrackerError::FrameOutOfOrder { last: 3, got: 3 });
        // Rejected frame leaves state untouched
        assert_eq!(t.frame_count(), 2);
    }

    #[test]
    fn invalid_config_rejected() {
        let cfg = TrackerConfig {
            registry: RegistryConfig {
                iou_threshold: -0.1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(Tracker::new(cfg).is_err());
    }

    #[test]
    fn config_parses_flat_json() {
        let cfg: TrackerConfig =
            serde_json::from_str(r#"{"max_age": 5, "iou_threshold": 0.5, "matcher": "greedy"}"#)
                .unwrap();
        assert_eq!(cfg.registry.max_age, 5);
        assert_eq!(cfg.registry.min_hits, 3);
        assert_eq!(cfg.registry.iou_threshold, 0.5);
        assert_eq!(cfg.matcher, MatcherKind::Greedy);
    }

    #[test]
    fn degenerate_detection_never_matches() {
        let mut t = tracker(30, 1);
        t.update(&[sheet(0.0)]);
        let flat = Detection {
            bbox: BBox::new(0.0, 150.0, 100.0, 150.0),
            score: 0.9,
        };
        let out = t.update(&[flat]);
        // Zero-area box cannot match; it becomes its own (NaN-ratio) track
        // which is dropped on its first prediction
        assert!(out.iter().all(|o| o.id != TrackId(1)));
        t.update(&[]);
        assert_eq!(t.tracks().len(), 1);
        assert_eq!(t.tracks()[0].id, TrackId(1));
    }
}
