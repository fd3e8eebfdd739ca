//! Track: identity, motion filter, lifecycle counters, prediction history.

use crate::{
    error::TrackerError,
    kf::{BoxKalmanFilter, KfConfig},
    types::{BBox, TrackId},
};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    /// Not yet confirmed — may be spurious
    Tentative,
    /// Confirmed: matched `min_hits` frames in a row
    Confirmed,
    /// Unmatched for more than `max_age` frames, removed at end of frame
    Deleted,
}

/// A single tracked object.
#[derive(Clone, Debug)]
pub struct Track {
    /// Unique identifier, never reused by the owning registry
    pub id: TrackId,
    /// Motion model (mean + covariance)
    pub kf: BoxKalmanFilter,
    /// Frames since creation
    pub age: u32,
    /// Total matched frames
    pub hits: u32,
    /// Consecutive matched frames since the last miss
    pub hit_streak: u32,
    /// Frames since the last match
    pub time_since_update: u32,
    /// Boxes predicted since the last update (most recent last)
    pub history: Vec<BBox>,
}

impl Track {
    /// Create a new tentative track seeded from an unmatched detection box.
    pub fn new(id: TrackId, bbox: &BBox, config: &KfConfig) -> Self {
        Self {
            id,
            kf: BoxKalmanFilter::new(bbox, config),
            age: 0,
            hits: 0,
            hit_streak: 0,
            time_since_update: 0,
            history: Vec::new(),
        }
    }

    /// Advance one frame. A track that was not updated since its last
    /// prediction loses its hit streak.
    pub fn predict(&mut self) -> BBox {
        let predicted = self.kf.predict();
        self.age += 1;
        if self.time_since_update > 0 {
            self.hit_streak = 0;
        }
        self.time_since_update += 1;
        self.history.push(predicted);
        predicted
    }

    /// Register a matched detection.
    pub fn update(&mut self, bbox: &BBox) -> Result<(), TrackerError> {
        self.time_since_update = 0;
        self.history.clear();
        self.hits += 1;
        self.hit_streak += 1;
        self.kf.update(bbox)
    }

    /// Current box estimate.
    pub fn bbox(&self) -> BBox {
        self.kf.bbox()
    }

    /// Most recent prediction, if any since the last update.
    pub fn last_prediction(&self) -> Option<&BBox> {
        self.history.last()
    }

    pub fn status(&self, min_hits: u32, max_age: u32) -> TrackStatus {
        if self.time_since_update > max_age {
            TrackStatus::Deleted
        } else if self.hit_streak >= min_hits {
            TrackStatus::Confirmed
        } else {
            TrackStatus::Tentative
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Track {
        Track::new(TrackId(1), &BBox::new(0.0, 0.0, 50.0, 50.0), &KfConfig::default())
    }

    #[test]
    fn new_track_is_tentative_with_zero_counters() {
        let t = track();
        assert_eq!(t.hits, 0);
        assert_eq!(t.hit_streak, 0);
        assert_eq!(t.age, 0);
        assert_eq!(t.status(3, 30), TrackStatus::Tentative);
    }

    #[test]
    fn streak_grows_while_matched() {
        let mut t = track();
        for _ in 0..3 {
            t.predict();
            t.update(&BBox::new(0.0, 0.0, 50.0, 50.0)).unwrap();
        }
        assert_eq!(t.hits, 3);
        assert_eq!(t.hit_streak, 3);
        assert_eq!(t.age, 3);
        assert_eq!(t.time_since_update, 0);
        assert!(t.history.is_empty());
        assert_eq!(t.status(3, 30), TrackStatus::Confirmed);
    }

    #[test]
    fn miss_resets_streak_on_next_predict() {
        let mut t = track();
        t.predict();
        t.update(&BBox::new(0.0, 0.0, 50.0, 50.0)).unwrap();
        t.predict(); // miss
        assert_eq!(t.hit_streak, 1, "streak survives until the next predict");
        t.predict();
        assert_eq!(t.hit_streak, 0);
        assert_eq!(t.time_since_update, 2);
        assert_eq!(t.history.len(), 2);
        assert!(t.last_prediction().is_some());
        assert_eq!(t.hits, 1);
    }

    #[test]
    fn deleted_after_max_age() {
        let mut t = track();
        for _ in 0..3 {
            t.predict();
        }
        assert_eq!(t.status(1, 3), TrackStatus::Tentative);
        t.predict();
        assert_eq!(t.status(1, 3), TrackStatus::Deleted);
    }
}
