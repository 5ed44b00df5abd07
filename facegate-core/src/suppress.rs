use std::{cmp::Ordering, time::Duration};

use facegate_utils::config::{BudgetSettings, DetectionSettings};
use log::{debug, warn};

use crate::budget::{Budget, Clock};
use crate::geometry::Detection;

/// Parameters for greedy non-maximum suppression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuppressConfig {
    /// IoU a lower-scored box must strictly exceed to be suppressed.
    pub iou_threshold: f32,
    /// Wall-clock allowance for the whole suppression pass.
    pub budget: Duration,
}

impl Default for SuppressConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            budget: Duration::from_millis(1_000),
        }
    }
}

impl SuppressConfig {
    pub fn from_settings(detection: &DetectionSettings, budgets: &BudgetSettings) -> Self {
        Self {
            iou_threshold: detection.nms_threshold,
            budget: budgets.suppress(),
        }
    }
}

/// Result of [`suppress`].
#[derive(Debug, Clone, Default)]
pub struct SuppressOutput {
    /// Accepted boxes, highest score first.
    pub kept: Vec<Detection>,
    /// Number of candidates that entered suppression.
    pub candidates: usize,
    /// Suppression stopped early because its budget ran out.
    pub timed_out: bool,
}

/// Greedy non-maximum suppression.
///
/// Candidates are stably sorted by ascending score and visited from the top.
/// Each visited box that has not been suppressed is kept, and every lower-ranked
/// box overlapping it by more than the threshold is suppressed. Boxes with equal
/// scores keep their input order. The budget is checked once per visited box;
/// on expiry the boxes kept so far are returned with `timed_out` set.
pub fn suppress(
    mut detections: Vec<Detection>,
    config: &SuppressConfig,
    clock: &dyn Clock,
) -> SuppressOutput {
    let candidates = detections.len();
    debug!(
        "suppression start: candidates={candidates} iou_threshold={:.2}",
        config.iou_threshold
    );
    if detections.is_empty() {
        return SuppressOutput::default();
    }

    let budget = Budget::start(clock, config.budget);
    detections.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));

    let mut suppressed = vec![false; candidates];
    let mut kept = Vec::new();
    let mut timed_out = false;

    for i in (0..candidates).rev() {
        if budget.expired() {
            warn!(
                "suppression budget of {:?} exceeded; returning {} partial result(s) from {candidates}",
                budget.limit(),
                kept.len()
            );
            timed_out = true;
            break;
        }
        if suppressed[i] {
            continue;
        }

        let current = detections[i];
        kept.push(current);
        for j in (0..i).rev() {
            if !suppressed[j] && current.bbox.iou(&detections[j].bbox) > config.iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    debug!(
        "suppression end: kept={} from {candidates} timed_out={timed_out}",
        kept.len()
    );
    SuppressOutput {
        kept,
        candidates,
        timed_out,
    }
}
