//! Fundamental types used across the entire workspace.

use nalgebra::{Matrix4, SMatrix, SVector, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Scalar type: use f64 throughout for numerical precision in Kalman filter.
// ---------------------------------------------------------------------------

/// 7-DOF box state vector: [cx, cy, scale, ratio, vcx, vcy, vscale]
pub type StateVec = SVector<f64, 7>;

/// 7×7 state covariance matrix
pub type StateCov = SMatrix<f64, 7, 7>;

/// Observation vector: [cx, cy, scale, ratio]
pub type ObsVec = Vector4<f64>;

/// 4×4 observation-space covariance (R, S)
pub type ObsCov = Matrix4<f64>;

/// 4×7 observation matrix H
pub type ObsMatrix = SMatrix<f64, 4, 7>;

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Bounding box
// ---------------------------------------------------------------------------

/// Axis-aligned box in image pixels, corners `(x1, y1)` top-left and
/// `(x2, y2)` bottom-right.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a box from its center and size.
    pub fn from_center(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x1 + self.width() / 2.0, self.y1 + self.height() / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Map the corners to the observation `[cx, cy, scale, ratio]`, where
    /// `scale = w*h` and `ratio = w/h`.
    pub fn to_observation(&self) -> ObsVec {
        let w = self.width();
        let h = self.height();
        let (cx, cy) = self.center();
        Vector4::new(cx, cy, w * h, w / h)
    }

    /// Inverse of [`BBox::to_observation`], reading the first four entries
    /// of a filter state. A negative `scale * ratio` yields NaN corners,
    /// which the registry treats as a dead track.
    pub fn from_state(state: &StateVec) -> Self {
        let w = (state[2] * state[3]).sqrt();
        let h = state[2] / w;
        Self::from_center(state[0], state[1], w, h)
    }

    /// Intersection over union. Zero-area or inverted boxes give 0.
    pub fn iou(&self, other: &BBox) -> f64 {
        let area_a = self.area();
        let area_b = other.area();
        if !(area_a > 0.0 && area_b > 0.0) {
            return 0.0;
        }

        let iw = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let ih = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = iw * ih;
        let union = area_a + area_b - inter;

        let iou = inter / union;
        if iou.is_finite() {
            iou
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// A single detector output for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    /// Detector confidence in [0, 1]
    pub score: f64,
}

impl Detection {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> Self {
        Self {
            bbox: BBox::new(x1, y1, x2, y2),
            score,
        }
    }

    /// Build from a raw detector row `[x1, y1, x2, y2, score]`.
    pub fn from_row(row: [f64; 5]) -> Self {
        Self::new(row[0], row[1], row[2], row[3], row[4])
    }
}

// ---------------------------------------------------------------------------
// TrackedObject — one reported row
// ---------------------------------------------------------------------------

/// A confirmed track as reported to the caller for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub bbox: BBox,
    pub id: TrackId,
}

impl TrackedObject {
    /// Row form `[x1, y1, x2, y2, id]`.
    pub fn to_row(&self) -> [f64; 5] {
        [
            self.bbox.x1,
            self.bbox.y1,
            self.bbox.x2,
            self.bbox.y2,
            self.id.0 as f64,
        ]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn iou_identical_boxes() {
        let a = BBox::new(10.0, 20.0, 110.0, 70.0);
        assert_abs_diff_eq!(a.iou(&a), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn iou_disjoint_boxes() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
        // Touching edges share no area
        let c = BBox::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn iou_partial_overlap() {
        // Intersection 5×10 = 50, union 100 + 100 − 50 = 150
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 15.0, 10.0);
        assert_abs_diff_eq!(a.iou(&b), 1.0 / 3.0, epsilon = 1e-12);

        // Intersection 50×50 = 2500, union 10000 + 10000 − 2500 = 17500
        let c = BBox::new(100.0, 100.0, 200.0, 200.0);
        let d = BBox::new(150.0, 150.0, 250.0, 250.0);
        assert_abs_diff_eq!(c.iou(&d), 2500.0 / 17500.0, epsilon = 1e-12);
    }

    #[test]
    fn iou_degenerate_box_is_zero() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let flat = BBox::new(0.0, 5.0, 10.0, 5.0);
        let inverted = BBox::new(10.0, 10.0, 0.0, 0.0);
        assert_eq!(a.iou(&flat), 0.0);
        assert_eq!(a.iou(&inverted), 0.0);
        assert_eq!(flat.iou(&flat), 0.0);
    }

    #[test]
    fn observation_roundtrip() {
        let b = BBox::new(0.0, 1.5, 12.6, 25.0);
        let z = b.to_observation();
        assert_abs_diff_eq!(z[0], 6.3, epsilon = 1e-12);
        assert_abs_diff_eq!(z[1], 13.25, epsilon = 1e-12);
        assert_abs_diff_eq!(z[2], 12.6 * 23.5, epsilon = 1e-9);
        assert_abs_diff_eq!(z[3], 12.6 / 23.5, epsilon = 1e-12);

        let mut state = StateVec::zeros();
        state.fixed_rows_mut::<4>(0).copy_from(&z);
        let back = BBox::from_state(&state);
        assert_abs_diff_eq!(back.x1, b.x1, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y1, b.y1, epsilon = 1e-9);
        assert_abs_diff_eq!(back.x2, b.x2, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y2, b.y2, epsilon = 1e-9);
    }

    #[test]
    fn negative_scale_gives_non_finite_box() {
        let state = StateVec::from_column_slice(&[50.0, 50.0, -10.0, 1.0, 0.0, 0.0, 0.0]);
        assert!(!BBox::from_state(&state).is_finite());
    }
}
