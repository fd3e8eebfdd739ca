//! Counting layer: turns reported track ids into a physical sheet count.
//!
//! The tracker only identifies; a sheet is counted the first time its id
//! is reported.

use crate::types::{TrackId, TrackedObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SheetCounter {
    counted: BTreeSet<TrackId>,
}

impl SheetCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame of tracker output. Returns the ids counted for the
    /// first time in this frame.
    pub fn observe(&mut self, objects: &[TrackedObject]) -> Vec<TrackId> {
        let mut fresh = Vec::new();
        for obj in objects {
            if self.counted.insert(obj.id) {
                info!(track = %obj.id, total = self.counted.len(), "sheet counted");
                fresh.push(obj.id);
            }
        }
        fresh
    }

    pub fn count(&self) -> usize {
        self.counted.len()
    }

    pub fn counted_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.counted.iter().copied()
    }

    pub fn is_counted(&self, id: TrackId) -> bool {
        self.counted.contains(&id)
    }

    /// Forget every counted id, e.g. when a new session starts.
    pub fn reset(&mut self) {
        self.counted.clear();
    }
}
