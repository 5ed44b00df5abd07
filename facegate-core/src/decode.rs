use std::time::Duration;

use facegate_utils::config::{BudgetSettings, DetectionSettings};
use log::{debug, warn};

use crate::budget::{Budget, Clock};
use crate::engine::AnchorOutput;
use crate::geometry::{BoundingBox, Detection};

/// Parameters for turning raw anchor tensors into candidate detections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeConfig {
    /// Foreground confidence an anchor must strictly exceed.
    pub score_threshold: f32,
    /// Wall-clock allowance for the anchor scan.
    pub budget: Duration,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            budget: Duration::from_millis(3_000),
        }
    }
}

impl DecodeConfig {
    pub fn from_settings(detection: &DetectionSettings, budgets: &BudgetSettings) -> Self {
        Self {
            score_threshold: detection.score_threshold,
            budget: budgets.decode(),
        }
    }
}

/// Candidates produced by [`decode_anchors`].
#[derive(Debug, Clone, Default)]
pub struct DecodeOutput {
    /// Candidates in anchor order, pixel space, unclamped.
    pub detections: Vec<Detection>,
    /// Anchors examined before finishing or running out of time.
    pub anchors_scanned: usize,
    /// The scan stopped early because its budget ran out.
    pub timed_out: bool,
}

/// Scan detector output and keep every anchor whose foreground confidence
/// exceeds the threshold, mapped onto an image of `image_size`.
///
/// The budget is re-checked before every anchor. Running out of time is not an
/// error: the candidates gathered so far are returned with `timed_out` set.
pub fn decode_anchors(
    output: &AnchorOutput,
    image_size: (u32, u32),
    config: &DecodeConfig,
    clock: &dyn Clock,
) -> DecodeOutput {
    let (width, height) = image_size;
    let anchors = output.anchor_count();
    if output.is_ragged() {
        warn!(
            "detector output is ragged (confidence len {}, boxes len {}); scanning {} anchors",
            output.confidence.len(),
            output.boxes.len(),
            anchors
        );
    }
    debug!(
        "decode start: anchors={anchors} threshold={:.2} image={width}x{height}",
        config.score_threshold
    );

    let budget = Budget::start(clock, config.budget);
    let mut decoded = DecodeOutput::default();
    for i in 0..anchors {
        if budget.expired() {
            warn!(
                "decode budget of {:?} exceeded after {i}/{anchors} anchors; returning {} partial candidate(s)",
                budget.limit(),
                decoded.detections.len()
            );
            decoded.timed_out = true;
            break;
        }
        decoded.anchors_scanned = i + 1;

        let score = output.confidence[i * 2 + 1];
        if score > config.score_threshold {
            let offsets = &output.boxes[i * 4..i * 4 + 4];
            let bbox = BoundingBox::from_normalized(
                [offsets[0], offsets[1], offsets[2], offsets[3]],
                width,
                height,
            );
            decoded.detections.push(Detection::new(bbox, score));
        }
    }

    debug!(
        "decode end: scanned={} candidates={} timed_out={}",
        decoded.anchors_scanned,
        decoded.detections.len(),
        decoded.timed_out
    );
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{MonotonicClock, testing::SteppingClock};

    fn output_from(anchors: &[(f32, [f32; 4])]) -> AnchorOutput {
        let mut confidence = Vec::new();
        let mut boxes = Vec::new();
        for (score, bbox) in anchors {
            confidence.extend([1.0 - score, *score]);
            boxes.extend(bbox);
        }
        AnchorOutput::new(confidence, boxes)
    }

    #[test]
    fn filters_by_threshold_and_maps_to_pixels() {
        let output = output_from(&[
            (0.95, [0.1, 0.1, 0.5, 0.5]),
            (0.30, [0.0, 0.0, 1.0, 1.0]),
            (0.50, [0.2, 0.2, 0.4, 0.4]),
        ]);
        let decoded = decode_anchors(
            &output,
            (200, 100),
            &DecodeConfig::default(),
            &MonotonicClock,
        );

        assert!(!decoded.timed_out);
        assert_eq!(decoded.anchors_scanned, 3);
        // 0.50 is not strictly above the default threshold.
        assert_eq!(decoded.detections.len(), 1);
        let det = decoded.detections[0];
        assert_eq!(det.score, 0.95);
        assert!((det.bbox.x1 - 20.0).abs() < 1e-4);
        assert!((det.bbox.y1 - 10.0).abs() < 1e-4);
        assert!((det.bbox.x2 - 100.0).abs() < 1e-4);
        assert!((det.bbox.y2 - 50.0).abs() < 1e-4);
    }

    #[test]
    fn empty_when_every_score_is_below_threshold() {
        let output = output_from(&[
            (0.1, [0.1, 0.1, 0.2, 0.2]),
            (0.49, [0.3, 0.3, 0.4, 0.4]),
            (0.0, [0.5, 0.5, 0.6, 0.6]),
        ]);
        let decoded = decode_anchors(&output, (64, 64), &DecodeConfig::default(), &MonotonicClock);
        assert!(decoded.detections.is_empty());
        assert_eq!(decoded.anchors_scanned, 3);
    }

    #[test]
    fn ignores_nan_confidence() {
        let output = output_from(&[(f32::NAN, [0.1, 0.1, 0.2, 0.2])]);
        let decoded = decode_anchors(&output, (64, 64), &DecodeConfig::default(), &MonotonicClock);
        assert!(decoded.detections.is_empty());
    }

    #[test]
    fn ragged_output_scans_common_prefix() {
        let mut output = output_from(&[
            (0.9, [0.1, 0.1, 0.2, 0.2]),
            (0.9, [0.3, 0.3, 0.4, 0.4]),
        ]);
        output.boxes.truncate(6);
        let decoded = decode_anchors(&output, (10, 10), &DecodeConfig::default(), &MonotonicClock);
        assert_eq!(decoded.anchors_scanned, 1);
        assert_eq!(decoded.detections.len(), 1);
    }

    #[test]
    fn timeout_returns_partial_candidates() {
        let output = output_from(&[(0.9, [0.1, 0.1, 0.2, 0.2]); 10]);
        // Budget start reads 0ms, then each check advances 1ms: anchors 0..=2 pass.
        let clock = SteppingClock::new(Duration::from_millis(1));
        let config = DecodeConfig {
            budget: Duration::from_millis(3),
            ..DecodeConfig::default()
        };
        let decoded = decode_anchors(&output, (10, 10), &config, &clock);
        assert!(decoded.timed_out);
        assert_eq!(decoded.anchors_scanned, 3);
        assert_eq!(decoded.detections.len(), 3);
    }

    #[test]
    fn zero_budget_with_moving_clock_yields_empty_result() {
        let output = output_from(&[(0.9, [0.1, 0.1, 0.2, 0.2]); 4]);
        let clock = SteppingClock::new(Duration::from_millis(1));
        let config = DecodeConfig {
            budget: Duration::ZERO,
            ..DecodeConfig::default()
        };
        let decoded = decode_anchors(&output, (10, 10), &config, &clock);
        assert!(decoded.timed_out);
        assert!(decoded.detections.is_empty());
    }
}
