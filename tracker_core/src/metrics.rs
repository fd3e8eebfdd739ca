//! Tracking metrics against ground truth: precision/recall, mean IoU,
//! ID switches, duplicate ids per sheet and count error.

use crate::{
    association::{associate, OptimalMatcher},
    types::{BBox, TrackId, TrackedObject},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Minimum overlap for a reported box to count as finding a sheet.
pub const MATCH_IOU: f64 = 0.5;

/// Ground-truth box of one sheet in one frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroundTruth {
    /// True sheet ID (from simulator)
    pub sheet_id: u64,
    pub bbox: BBox,
}

/// Accumulated metric statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackingMetrics {
    /// Number of frames evaluated
    pub n_frames: u64,
    /// Reported boxes matched to a sheet
    pub true_positives: u64,
    /// Reported boxes matching no sheet
    pub false_positives: u64,
    /// Visible sheets without a reported box
    pub false_negatives: u64,
    /// A sheet's matched track id changed between frames
    pub id_switches: u64,
    /// Sum of IoU over true positives
    pub sum_iou: f64,
    #[serde(skip)]
    last_track: HashMap<u64, TrackId>,
    #[serde(skip)]
    ids_per_sheet: HashMap<u64, BTreeSet<TrackId>>,
}

/// Serializable end-of-run summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub frames: u64,
    pub precision: f64,
    pub recall: f64,
    pub mean_iou: f64,
    pub id_switches: u64,
    /// Sheets that were reported at least once
    pub sheets_tracked: usize,
    /// Extra ids beyond the first, summed over sheets
    pub duplicate_ids: usize,
}

impl TrackingMetrics {
    /// Precision = TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denom = (self.true_positives + self.false_positives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Recall = TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denom = (self.true_positives + self.false_negatives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    pub fn mean_iou(&self) -> f64 {
        if self.true_positives == 0 {
            return 0.0;
        }
        self.sum_iou / self.true_positives as f64
    }

    /// Extra track ids beyond the first, summed over every sheet. Each one is
    /// a sheet that would be counted more than once.
    pub fn duplicate_ids(&self) -> usize {
        self.ids_per_sheet
            .values()
            .map(|ids| ids.len().saturating_sub(1))
            .sum()
    }

    pub fn sheets_tracked(&self) -> usize {
        self.ids_per_sheet.len()
    }

    /// Accumulate one frame of tracker output against ground truth.
    pub fn accumulate(&mut self, reported: &[TrackedObject], ground_truths: &[GroundTruth]) {
        self.n_frames += 1;

        let gt_boxes: Vec<BBox> = ground_truths.iter().map(|g| g.bbox).collect();
        let rep_boxes: Vec<BBox> = reported.iter().map(|r| r.bbox).collect();
        let assignment = associate(&gt_boxes, &rep_boxes, MATCH_IOU, &OptimalMatcher);

        for &(gi, ri) in &assignment.pairs {
            let sheet = ground_truths[gi].sheet_id;
            let track = reported[ri].id;
            self.true_positives += 1;
            self.sum_iou += gt_boxes[gi].iou(&rep_boxes[ri]);

            if let Some(prev) = self.last_track.insert(sheet, track) {
                if prev != track {
                    self.id_switches += 1;
                }
            }
            self.ids_per_sheet.entry(sheet).or_default().insert(track);
        }

        self.false_negatives += assignment.unmatched_detections.len() as u64;
        self.false_positives += assignment.unmatched_tracks.len() as u64;
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            frames: self.n_frames,
            precision: self.precision(),
            recall: self.recall(),
            mean_iou: self.mean_iou(),
            id_switches: self.id_switches,
            sheets_tracked: self.sheets_tracked(),
            duplicate_ids: self.duplicate_ids(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
