//! Sheet trajectory models.
//!
//! Each sheet has a true center, velocity and size in image pixels, and a
//! `MotionSpec` describing how it moves per frame. The simulator steps every
//! sheet forward one frame at a time.

use serde::{Deserialize, Serialize};
use tracker_core::types::BBox;

/// Describes sheet motion between frames.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MotionSpec {
    /// Constant velocity in px/frame.
    ConstantVelocity,
    /// Constant acceleration in px/frame².
    ConstantAccel { ax: f64, ay: f64 },
    /// Resting on the stack or a stopped belt.
    Stationary,
    /// Switch motion model at given frames.
    /// `segments` is sorted by frame ascending: [(start_frame, MotionSpec), ...].
    /// The active spec is the last one whose start_frame <= current frame.
    Segmented {
        segments: Vec<(u64, Box<MotionSpec>)>,
    },
}

/// A simulated sheet with ground-truth geometry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sheet {
    /// True sheet ID (used for metrics)
    pub id: u64,
    /// Box center [cx, cy] in pixels
    pub center: [f64; 2],
    /// [vx, vy] in px/frame
    pub velocity: [f64; 2],
    /// [width, height] in pixels
    pub size: [f64; 2],
    pub motion: MotionSpec,
    /// Sheet is not visible before this frame
    pub appear_at: Option<u64>,
    /// Sheet is not visible from this frame on
    pub disappear_at: Option<u64>,
}

impl Sheet {
    pub fn new(id: u64, center: [f64; 2], velocity: [f64; 2], size: [f64; 2]) -> Self {
        Self {
            id,
            center,
            velocity,
            size,
            motion: MotionSpec::ConstantVelocity,
            appear_at: None,
            disappear_at: None,
        }
    }

    pub fn with_motion(mut self, motion: MotionSpec) -> Self {
        self.motion = motion;
        self
    }

    pub fn visible_between(mut self, appear_at: Option<u64>, disappear_at: Option<u64>) -> Self {
        self.appear_at = appear_at;
        self.disappear_at = disappear_at;
        self
    }

    /// Advance the true state by one frame.
    pub fn step(&mut self, frame: u64) {
        let motion = self.motion.clone();
        self.apply(&motion, frame);
    }

    fn apply(&mut self, motion: &MotionSpec, frame: u64) {
        match motion {
            MotionSpec::ConstantVelocity => {
                self.center[0] += self.velocity[0];
                self.center[1] += self.velocity[1];
            }
            MotionSpec::ConstantAccel { ax, ay } => {
                self.center[0] += self.velocity[0] + 0.5 * ax;
                self.center[1] += self.velocity[1] + 0.5 * ay;
                self.velocity[0] += ax;
                self.velocity[1] += ay;
            }
            MotionSpec::Stationary => {}
            MotionSpec::Segmented { segments } => {
                let active = segments.iter().filter(|(start, _)| *start <= frame).last();
                match active {
                    Some((_, spec)) => self.apply(spec, frame),
                    // Before first segment: CV
                    None => self.apply(&MotionSpec::ConstantVelocity, frame),
                }
            }
        }
    }

    /// True if the sheet is in view at `frame`.
    pub fn is_active(&self, frame: u64) -> bool {
        if let Some(appear) = self.appear_at {
            if frame < appear {
                return false;
            }
        }
        if let Some(disappear) = self.disappear_at {
            if frame >= disappear {
                return false;
            }
        }
        true
    }

    pub fn bbox(&self) -> BBox {
        BBox::from_center(self.center[0], self.center[1], self.size[0], self.size[1])
    }
}
