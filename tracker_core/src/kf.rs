//! Kalman filter for one tracked box: predict and update steps.
//!
//! # Design choices
//! - A **linear KF** with a constant-velocity (CV) model, one step per frame.
//! - All math is done in `f64` via `nalgebra` fixed-size matrices.
//! - Noise is fixed per configuration; there is no online adaptation.
//!
//! ## State vector
//! x = [cx, cy, s, r, vcx, vcy, vs]ᵀ  (7-dimensional)
//!
//! `s = w·h` is the box area and `r = w/h` its aspect ratio. The ratio has
//! no velocity term.
//!
//! ## CV Transition model
//! F = I₇ with F[0,4] = F[1,5] = F[2,6] = 1, i.e. cx += vcx, cy += vcy, s += vs.
//!
//! ## Observation
//! z = [cx, cy, s, r]ᵀ = H·x with H = [I₄ 0].

use crate::{
    error::TrackerError,
    types::{BBox, ObsCov, ObsMatrix, ObsVec, StateCov, StateVec},
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Noise configuration shared by every track of a tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KfConfig {
    /// Diagonal of the initial state covariance P₀.
    /// Velocities are unobserved at birth, hence the large values.
    pub initial_cov: [f64; 7],
    /// Diagonal of the measurement noise R over (cx, cy, s, r).
    /// Detector box size jitters more than its center.
    pub measurement_noise: [f64; 4],
    /// Diagonal of the process noise Q over (cx, cy, s, r, vcx, vcy, vs).
    pub process_noise: [f64; 7],
}

impl Default for KfConfig {
    fn default() -> Self {
        Self {
            initial_cov: [1., 1., 1., 1., 1000., 1000., 1000.],
            measurement_noise: [1., 1., 10., 10.],
            process_noise: [1., 1., 1., 1., 0.01, 0.01, 0.0001],
        }
    }
}

impl KfConfig {
    pub(crate) fn validate(&self) -> Result<(), TrackerError> {
        let all = self
            .initial_cov
            .iter()
            .chain(self.measurement_noise.iter())
            .chain(self.process_noise.iter());
        for &v in all {
            if !(v.is_finite() && v > 0.0) {
                return Err(TrackerError::InvalidConfig(format!(
                    "noise diagonals must be finite and positive, got {v}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Build state transition matrix F for one frame.
pub fn transition_matrix() -> StateCov {
    let mut f = StateCov::identity();
    // cx, cy, s += their velocity
    f[(0, 4)] = 1.0;
    f[(1, 5)] = 1.0;
    f[(2, 6)] = 1.0;
    f
}

/// Build the 4×7 observation matrix H.
pub fn observation_matrix() -> ObsMatrix {
    let mut h = ObsMatrix::zeros();
    for i in 0..4 {
        h[(i, i)] = 1.0;
    }
    h
}

/// Constant-velocity Kalman filter over one box.
#[derive(Clone, Debug)]
pub struct BoxKalmanFilter {
    pub state: StateVec,
    pub cov: StateCov,
    q: StateCov,
    r: ObsCov,
}

impl BoxKalmanFilter {
    /// Seed the filter from a first detection, with zero velocity.
    pub fn new(bbox: &BBox, config: &KfConfig) -> Self {
        let mut state = StateVec::zeros();
        state.fixed_rows_mut::<4>(0).copy_from(&bbox.to_observation());
        Self {
            state,
            cov: StateCov::from_diagonal(&StateVec::from(config.initial_cov)),
            q: StateCov::from_diagonal(&StateVec::from(config.process_noise)),
            r: ObsCov::from_diagonal(&ObsVec::from(config.measurement_noise)),
        }
    }

    /// Advance one frame and return the predicted box.
    pub fn predict(&mut self) -> BBox {
        // Area would go non-positive: stop shrinking instead
        if self.state[6] + self.state[2] <= 0.0 {
            self.state[6] = 0.0;
        }
        let f = transition_matrix();
        self.state = f * self.state;
        self.cov = f * self.cov * f.transpose() + self.q;
        self.bbox()
    }

    /// Correct the state with an observed box.
    pub fn update(&mut self, bbox: &BBox) -> Result<(), TrackerError> {
        let h = observation_matrix();
        let z = bbox.to_observation();

        // Innovation: ν = z − H·x
        let innovation = z - h * self.state;

        // Innovation covariance: S = H·P·Hᵀ + R
        let s = h * self.cov * h.transpose() + self.r;
        let s_inv = s.try_inverse().ok_or(TrackerError::SingularInnovation)?;

        // Kalman gain: K = P·Hᵀ·S⁻¹
        let k = self.cov * h.transpose() * s_inv;

        self.state += k * innovation;

        // Joseph form P' = (I−KH)·P·(I−KH)ᵀ + K·R·Kᵀ
        let i_kh = StateCov::identity() - k * h;
        self.cov = i_kh * self.cov * i_kh.transpose() + k * self.r * k.transpose();
        Ok(())
    }

    /// Current best box estimate, without advancing time.
    pub fn bbox(&self) -> BBox {
        BBox::from_state(&self.state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
