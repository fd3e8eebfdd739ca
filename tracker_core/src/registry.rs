//! Track registry: owns the live tracks and runs one frame of the
//! predict → associate → update → birth → report → prune cycle.
//!
//! # Track Management Policy
//! - **Birth**: each unmatched detection spawns a tentative track with the
//!   next id of this registry's counter. Ids start at 1 and never repeat.
//! - **Confirmation**: a track is reported once its hit streak reaches
//!   `min_hits`, or unconditionally while the registry itself is within its
//!   first `min_hits` frames (bootstrap window).
//! - **Reporting**: only tracks matched in the current frame are reported.
//! - **Deletion**: a track unmatched for more than `max_age` frames is removed
//!   at the end of the frame. Tracks whose prediction turns non-finite are
//!   removed before association.

use crate::{
    association::{associate, Matcher},
    error::TrackerError,
    kf::KfConfig,
    track::Track,
    types::{BBox, Detection, TrackId, TrackedObject},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Configuration for track management policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Frames a track may stay unmatched before deletion
    pub max_age: u32,
    /// Consecutive hits before a track is reported; also the bootstrap window
    pub min_hits: u32,
    /// Minimum IoU to accept a detection–track match
    pub iou_threshold: f64,
    /// Minimum detection score to start a new track (0 disables the check)
    pub init_min_score: f64,
    /// Motion model noise
    pub kf_config: KfConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_age: 30,
            min_hits: 3,
            iou_threshold: 0.3,
            init_min_score: 0.0,
            kf_config: KfConfig::default(),
        }
    }
}

impl RegistryConfig {
    pub(crate) fn validate(&self) -> Result<(), TrackerError> {
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(TrackerError::InvalidConfig(format!(
                "iou_threshold must lie in [0, 1], got {}",
                self.iou_threshold
            )));
        }
        if !self.init_min_score.is_finite() {
            return Err(TrackerError::InvalidConfig(
                "init_min_score must be finite".into(),
            ));
        }
        self.kf_config.validate()
    }
}

/// Counters for one processed frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    /// Registry frame counter after this frame (first frame is 1)
    pub frame: u64,
    /// Detection–track pairs accepted by the gate
    pub matches: usize,
    /// Tracks born this frame
    pub births: usize,
    /// Tracks whose hit streak reached `min_hits` this frame
    pub confirmations: usize,
    /// Tracks removed for exceeding `max_age`
    pub deletions: usize,
    /// Tracks removed because their state became numerically invalid
    pub dropped_invalid: usize,
}

/// Owns every live track of one stream.
#[derive(Clone, Debug)]
pub struct TrackRegistry {
    pub config: RegistryConfig,
    tracks: Vec<Track>,
    next_id: u64,
    frame_count: u64,
}

impl TrackRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
            frame_count: 0,
        }
    }

    fn next_track_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Live tracks in creation order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Frames processed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Run one frame. Returns the reported (confirmed) objects.
    pub fn step(
        &mut self,
        detections: &[Detection],
        matcher: &dyn Matcher,
    ) -> (Vec<TrackedObject>, FrameStats) {
        self.frame_count += 1;
        let mut stats = FrameStats {
            frame: self.frame_count,
            ..Default::default()
        };

        // ----------------------------------------------------------------
        // Step 1: Predict, dropping tracks that went numerically invalid
        // ----------------------------------------------------------------
        let mut predictions = Vec::with_capacity(self.tracks.len());
        self.tracks.retain_mut(|track| {
            let predicted = track.predict();
            if predicted.is_finite() {
                predictions.push(predicted);
                true
            } else {
                warn!(track = %track.id, "dropping track with non-finite prediction");
                stats.dropped_invalid += 1;
                false
            }
        });

        // ----------------------------------------------------------------
        // Step 2: Associate
        // ----------------------------------------------------------------
        let det_boxes: Vec<BBox> = detections.iter().map(|d| d.bbox).collect();
        let assignment = associate(
            &det_boxes,
            &predictions,
            self.config.iou_threshold,
            matcher,
        );
        stats.matches = assignment.pairs.len();

        // ----------------------------------------------------------------
        // Step 3: Update matched tracks
        // ----------------------------------------------------------------
        let mut broken = vec![false; self.tracks.len()];
        for &(di, ti) in &assignment.pairs {
            let track = &mut self.tracks[ti];
            if let Err(err) = track.update(&det_boxes[di]) {
                warn!(track = %track.id, %err, "dropping track after failed update");
                broken[ti] = true;
                continue;
            }
            if track.hit_streak == self.config.min_hits {
                debug!(track = %track.id, age = track.age, "track confirmed");
                stats.confirmations += 1;
            }
        }
        if broken.iter().any(|&b| b) {
            let mut idx = 0;
            self.tracks.retain(|_| {
                let keep = !broken[idx];
                idx += 1;
                keep
            });
            stats.dropped_invalid += broken.iter().filter(|&&b| b).count();
        }

        // ----------------------------------------------------------------
        // Step 4: Birth tentative tracks for unmatched detections
        // ----------------------------------------------------------------
        for &di in &assignment.unmatched_detections {
            let det = &detections[di];
            if det.score < self.config.init_min_score {
                trace!(score = det.score, "detection below birth score");
                continue;
            }
            let id = self.next_track_id();
            debug!(track = %id, frame = self.frame_count, "track born");
            self.tracks
                .push(Track::new(id, &det.bbox, &self.config.kf_config));
            stats.births += 1;
        }

        // ----------------------------------------------------------------
        // Step 5: Report confirmed tracks matched this frame
        // ----------------------------------------------------------------
        let min_hits = self.config.min_hits;
        let bootstrap = self.frame_count <= u64::from(min_hits);
        let reported = self
            .tracks
            .iter()
            .filter(|t| t.time_since_update < 1 && (t.hit_streak >= min_hits || bootstrap))
            .map(|t| TrackedObject {
                bbox: t.bbox(),
                id: t.id,
            })
            .collect();

        // ----------------------------------------------------------------
        // Step 6: Prune expired tracks
        // ----------------------------------------------------------------
        let max_age = self.config.max_age;
        let before = self.tracks.len();
        self.tracks.retain(|t| {
            let keep = t.time_since_update <= max_age;
            if !keep {
                debug!(track = %t.id, hits = t.hits, age = t.age, "track expired");
            }
            keep
        });
        stats.deletions = before - self.tracks.len();

        (reported, stats)
    }

    /// Every living track, including tentative and coasting ones.
    pub fn live_tracks(&self) -> Vec<TrackedObject> {
        self.tracks
            .iter()
            .map(|t| TrackedObject {
                bbox: t.bbox(),
                id: t.id,
            })
            .collect()
    }

    /// Remove all tracks. The id counter keeps running.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Remove one track. Returns false if no live track has that id.
    pub fn remove(&mut self, id: TrackId) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.id != id);
        self.tracks.len() != before
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::OptimalMatcher;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
        Detection::new(x1, y1, x2, y2, 0.9)
    }

    #[test]
    fn births_one_track_per_unmatched_detection() {
        let mut reg = TrackRegistry::new(RegistryConfig::default());
        let (_, stats) = reg.step(
            &[det(0., 0., 50., 50.), det(200., 200., 260., 260.)],
            &OptimalMatcher,
        );
        assert_eq!(stats.births, 2);
        assert_eq!(reg.tracks().len(), 2);
        assert_eq!(reg.tracks()[0].id, TrackId(1));
        assert_eq!(reg.tracks()[1].id, TrackId(2));
    }

    #[test]
    fn tentative_hidden_after_bootstrap_until_min_hits() {
        let mut reg = TrackRegistry::new(RegistryConfig {
            min_hits: 2,
            ..Default::default()
        });
        // Frames 1–2 are the bootstrap window; burn them with nothing
        reg.step(&[], &OptimalMatcher);
        reg.step(&[], &OptimalMatcher);

        let d = [det(100., 100., 200., 200.)];
        let (out, _) = reg.step(&d, &OptimalMatcher); // born, streak 0
        assert!(out.is_empty());
        let (out, _) = reg.step(&d, &OptimalMatcher); // streak 1
        assert!(out.is_empty());
        let (out, stats) = reg.step(&d, &OptimalMatcher); // streak 2
        assert_eq!(out.len(), 1);
        assert_eq!(stats.confirmations, 1);
    }

    #[test]
    fn non_finite_prediction_is_dropped() {
        let mut reg = TrackRegistry::new(RegistryConfig::default());
        reg.step(&[det(0., 0., 10., 10.)], &OptimalMatcher);
        reg.tracks[0].kf.state[0] = f64::NAN;

        let (out, stats) = reg.step(&[], &OptimalMatcher);
        assert!(out.is_empty());
        assert_eq!(stats.dropped_invalid, 1);
        assert!(reg.tracks().is_empty());
    }

    #[test]
    fn birth_score_gate() {
        let mut reg = TrackRegistry::new(RegistryConfig {
            init_min_score: 0.5,
            ..Default::default()
        });
        let (_, stats) = reg.step(
            &[
                Detection::new(0., 0., 10., 10., 0.9),
                Detection::new(50., 50., 60., 60., 0.2),
            ],
            &OptimalMatcher,
        );
        assert_eq!(stats.births, 1);
    }

    #[test]
    fn clear_and_remove_keep_counter_running() {
        let mut reg = TrackRegistry::new(RegistryConfig::default());
        reg.step(&[det(0., 0., 10., 10.), det(50., 50., 60., 60.)], &OptimalMatcher);
        assert!(reg.remove(TrackId(1)));
        assert!(!reg.remove(TrackId(1)));
        assert_eq!(reg.live_tracks().len(), 1);

        reg.clear();
        assert!(reg.live_tracks().is_empty());
        reg.step(&[det(0., 0., 10., 10.)], &OptimalMatcher);
        assert_eq!(reg.tracks()[0].id, TrackId(3));
    }

    #[test]
    fn invalid_config_rejected() {
        let cfg = RegistryConfig {
            iou_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(TrackerError::InvalidConfig(_))));
    }
}
