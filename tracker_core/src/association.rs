//! Data association: IoU cost matrix, bipartite matching, overlap gate.
//!
//! # Algorithm pipeline
//! 1. Build a dense |D|×|T| matrix of IoU(detection, predicted track box).
//! 2. Solve the assignment maximising total IoU (minimising −IoU) with a
//!    [`Matcher`]: the optimal Hungarian solver or the greedy fallback.
//! 3. Reject proposed pairs whose IoU is below the gate; both sides fall
//!    back to unmatched.

use crate::types::BBox;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Matchers
// ---------------------------------------------------------------------------

/// Solves a rectangular assignment problem on a row-major cost matrix.
pub trait Matcher: Send + Sync {
    /// Return `(row, col)` pairs of a low-cost matching. At most one pair
    /// per row and per column.
    fn solve(&self, cost: &[f64], rows: usize, cols: usize) -> Vec<(usize, usize)>;
}

/// Which matcher a tracker uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    #[default]
    Optimal,
    Greedy,
}

impl MatcherKind {
    pub fn build(self) -> Box<dyn Matcher> {
        match self {
            MatcherKind::Optimal => Box::new(OptimalMatcher),
            MatcherKind::Greedy => Box::new(GreedyMatcher),
        }
    }
}

/// Globally optimal assignment (Hungarian / Kuhn-Munkres, O(n³)).
#[derive(Clone, Copy, Debug, Default)]
pub struct OptimalMatcher;

impl Matcher for OptimalMatcher {
    fn solve(&self, cost: &[f64], rows: usize, cols: usize) -> Vec<(usize, usize)> {
        if rows == 0 || cols == 0 {
            return Vec::new();
        }

        // Pad to a square n×n matrix. Any constant works for the padding:
        // every perfect matching uses the same number of padded cells.
        let n = rows.max(cols);
        let mut square = vec![0.0; n * n];
        for r in 0..rows {
            square[r * n..r * n + cols].copy_from_slice(&cost[r * cols..(r + 1) * cols]);
        }

        run_hungarian(&square, n)
            .into_iter()
            .enumerate()
            .filter(|&(r, c)| r < rows && c < cols)
            .collect()
    }
}

/// Greedy fallback: repeatedly fix the cheapest remaining pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyMatcher;

impl Matcher for GreedyMatcher {
    fn solve(&self, cost: &[f64], rows: usize, cols: usize) -> Vec<(usize, usize)> {
        let mut used_rows = vec![false; rows];
        let mut used_cols = vec![false; cols];
        let mut pairs = Vec::with_capacity(rows.min(cols));

        for _ in 0..rows.min(cols) {
            let mut best: Option<(usize, usize)> = None;
            let mut best_cost = f64::INFINITY;
            for r in (0..rows).filter(|&r| !used_rows[r]) {
                for c in (0..cols).filter(|&c| !used_cols[c]) {
                    if cost[r * cols + c] < best_cost {
                        best_cost = cost[r * cols + c];
                        best = Some((r, c));
                    }
                }
            }
            let Some((r, c)) = best else { break };
            used_rows[r] = true;
            used_cols[c] = true;
            pairs.push((r, c));
        }
        pairs
    }
}

/// Core Hungarian algorithm on a square n×n cost matrix (row-major).
/// Returns row_assignment[row] = assigned_column.
fn run_hungarian(cost: &[f64], n: usize) -> Vec<usize> {
    // Potentials for rows (u) and columns (v)
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    // p[j] = row assigned to column j (1-indexed, 0 = none)
    let mut p = vec![0usize; n + 1];
    // way[j] = previous column in augmenting path
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=n {
                if !used[j] {
                    let val = cost[(i0 - 1) * n + (j - 1)] - u[i0] - v[j];
                    if val < minv[j] {
                        minv[j] = val;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Augment
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut row_assign = vec![0usize; n];
    for j in 1..=n {
        if p[j] != 0 {
            row_assign[p[j] - 1] = j - 1;
        }
    }
    row_assign
}

// ---------------------------------------------------------------------------
// Association
// ---------------------------------------------------------------------------

/// Association result for one frame. Indices refer to the detection and
/// prediction slices handed to [`associate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assignment {
    /// (detection_idx, track_idx) pairs that passed the gate
    pub pairs: Vec<(usize, usize)>,
    /// Detections that start new tracks
    pub unmatched_detections: Vec<usize>,
    /// Tracks without a detection this frame
    pub unmatched_tracks: Vec<usize>,
}

/// Row-major |detections| × |predictions| IoU matrix.
pub fn iou_matrix(detections: &[BBox], predictions: &[BBox]) -> Vec<f64> {
    detections
        .iter()
        .flat_map(|d| predictions.iter().map(move |t| d.iou(t)))
        .collect()
}

/// Match detections to predicted track boxes. Pairs with IoU strictly below
/// `iou_threshold` are rejected.
pub fn associate(
    detections: &[BBox],
    predictions: &[BBox],
    iou_threshold: f64,
    matcher: &dyn Matcher,
) -> Assignment {
    if predictions.is_empty() || detections.is_empty() {
        return Assignment {
            pairs: vec![],
            unmatched_detections: (0..detections.len()).collect(),
            unmatched_tracks: (0..predictions.len()).collect(),
        };
    }

    let (nd, nt) = (detections.len(), predictions.len());
    let ious = iou_matrix(detections, predictions);
    let cost: Vec<f64> = ious.iter().map(|x| -x).collect();

    let mut det_matched = vec![false; nd];
    let mut trk_matched = vec![false; nt];
    let mut pairs = Vec::new();
    for (d, t) in matcher.solve(&cost, nd, nt) {
        if ious[d * nt + t] < iou_threshold {
            continue;
        }
        det_matched[d] = true;
        trk_matched[t] = true;
        pairs.push((d, t));
    }
    pairs.sort_unstable();

    Assignment {
        pairs,
        unmatched_detections: (0..nd).filter(|&d| !det_matched[d]).collect(),
        unmatched_tracks: (0..nt).filter(|&t| !trk_matched[t]).collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
