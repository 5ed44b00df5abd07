//! Staged block/allow decision over one image.
//!
//! An invocation moves through [`Stage::Init`], [`Stage::Decoding`],
//! [`Stage::Suppressing`], and [`Stage::ClassifyingFaces`] before reaching
//! [`Stage::Done`]. The first face classified as blocked ends the run. Stage
//! budgets truncate work; checkpoint budgets measured from the start of the
//! invocation end it with the verdict chosen by the [`TimeoutPolicy`].

use std::{fmt, sync::Arc, time::Duration};

use facegate_utils::{
    SourceLayout,
    config::{AppSettings, BudgetSettings, TimeoutPolicy},
    source_layout, stage_timer, to_rgb,
};
use image::{DynamicImage, RgbImage};
use log::{debug, warn};

use crate::budget::{Budget, Clock, MonotonicClock};
use crate::classifier::{ClassifyError, FaceClassifier};
use crate::crop::FaceCrop;
use crate::decode::{DecodeConfig, decode_anchors};
use crate::engine::DetectorEngine;
use crate::error::PipelineError;
use crate::geometry::Detection;
use crate::model::Engines;
use crate::preprocess::{PreprocessConfig, image_to_tensor};
use crate::suppress::{SuppressConfig, suppress};

/// Final decision for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Block,
    Allow,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Block => "BLOCK",
            Verdict::Allow => "ALLOW",
        })
    }
}

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Decoding,
    Suppressing,
    ClassifyingFaces,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Init => "init",
            Stage::Decoding => "decoding",
            Stage::Suppressing => "suppressing",
            Stage::ClassifyingFaces => "classifying_faces",
            Stage::Done => "done",
        })
    }
}

/// Why the pipeline reached its verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    /// The face at `index` (in suppression order) scored `score` for the
    /// blocked category.
    BlockedFace { index: usize, score: f32 },
    /// Suppression left no faces.
    NoFaces,
    /// Every face was allowed or skipped.
    NoBlockedFace,
    /// A checkpoint budget ran out in `stage`.
    Timeout { stage: Stage },
    /// The invocation could not run.
    Failed(PipelineError),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::BlockedFace { index, score } => {
                write!(f, "face {index} blocked (score {score:.3})")
            }
            Reason::NoFaces => f.write_str("no faces detected"),
            Reason::NoBlockedFace => f.write_str("no blocked face"),
            Reason::Timeout { stage } => write!(f, "timed out during {stage}"),
            Reason::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub verdict: Verdict,
    pub reason: Reason,
    /// Faces that survived suppression.
    pub faces_detected: usize,
    /// Faces the classifier produced a valid result for.
    pub faces_classified: usize,
    /// Faces skipped for degenerate geometry or unusable classifier output.
    pub faces_skipped: usize,
    pub elapsed: Duration,
}

impl Outcome {
    pub fn is_blocked(&self) -> bool {
        self.verdict == Verdict::Block
    }
}

/// Thresholds, budgets, and normalization for a [`DecisionPipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub decode: DecodeConfig,
    pub suppress: SuppressConfig,
    pub budgets: BudgetSettings,
    pub timeout_policy: TimeoutPolicy,
    pub preprocess: PreprocessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppSettings::default())
    }
}

impl From<&AppSettings> for PipelineConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            decode: DecodeConfig::from_settings(&settings.detection, &settings.budgets),
            suppress: SuppressConfig::from_settings(&settings.detection, &settings.budgets),
            budgets: settings.budgets,
            timeout_policy: settings.timeout_policy,
            preprocess: PreprocessConfig::default(),
        }
    }
}

/// Per-invocation tallies, folded into the [`Outcome`].
#[derive(Debug, Default)]
struct Tally {
    detected: usize,
    classified: usize,
    skipped: usize,
}

/// Detector + classifier decision pipeline.
///
/// Holds only shared, read-only state, so one instance can serve concurrent
/// invocations.
#[derive(Clone)]
pub struct DecisionPipeline {
    detector: Arc<dyn DetectorEngine>,
    classifier: FaceClassifier,
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for DecisionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionPipeline")
            .field("detector_input", &self.detector.input_size())
            .field("classifier", &self.classifier)
            .field("config", &self.config)
            .finish()
    }
}

impl DecisionPipeline {
    pub fn new(engines: &Engines, config: PipelineConfig) -> Self {
        Self {
            detector: Arc::clone(&engines.detector),
            classifier: FaceClassifier::new(Arc::clone(&engines.classifier)),
            config,
            clock: Arc::new(MonotonicClock),
        }
    }

    /// Replace the time source used for every budget.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decide whether `image` is blocked.
    ///
    /// Never fails: conditions that prevent the run yield [`Verdict::Allow`]
    /// with [`Reason::Failed`].
    pub fn evaluate(&self, image: &DynamicImage) -> Outcome {
        let _timer = stage_timer("facegate_core::evaluate", log::Level::Debug);
        let total = Budget::start(self.clock.as_ref(), self.config.budgets.total());

        if image.width() == 0 || image.height() == 0 {
            return self.failed(PipelineError::EmptyImage, &total);
        }
        let Some(rgb) = to_rgb(image) else {
            let channels = image.color().channel_count();
            return self.failed(PipelineError::UnsupportedChannels(channels), &total);
        };
        if source_layout(image) == SourceLayout::Rgba {
            debug!("dropping alpha channel from RGBA input");
        }
        self.run(&rgb, &total)
    }

    /// Decide whether an already-RGB image is blocked.
    pub fn evaluate_rgb(&self, image: &RgbImage) -> Outcome {
        let _timer = stage_timer("facegate_core::evaluate_rgb", log::Level::Debug);
        let total = Budget::start(self.clock.as_ref(), self.config.budgets.total());
        if image.width() == 0 || image.height() == 0 {
            return self.failed(PipelineError::EmptyImage, &total);
        }
        self.run(image, &total)
    }

    fn run(&self, image: &RgbImage, total: &Budget<'_>) -> Outcome {
        let budgets = &self.config.budgets;
        let mut tally = Tally::default();
        let (width, height) = image.dimensions();

        // Init
        if total.checkpoint(budgets.entry_checkpoint()).expired() {
            return self.timed_out(Stage::Init, &tally, total);
        }

        let input = match image_to_tensor(
            image,
            self.detector.input_size(),
            &self.config.preprocess.detector,
        ) {
            Ok(input) => input,
            Err(e) => return self.failed(PipelineError::Preprocess(format!("{e:#}")), total),
        };
        let anchors = {
            let _timer = stage_timer("facegate_core::detector", log::Level::Debug);
            match self.detector.detect(input) {
                Ok(anchors) => anchors,
                Err(e) => return self.failed(PipelineError::Detector(format!("{e:#}")), total),
            }
        };

        // Decoding
        let decoded = decode_anchors(
            &anchors,
            (width, height),
            &self.config.decode,
            self.clock.as_ref(),
        );
        if total.checkpoint(budgets.decode_checkpoint()).expired() {
            return self.timed_out(Stage::Decoding, &tally, total);
        }

        // Suppressing
        let suppressed = suppress(
            decoded.detections,
            &self.config.suppress,
            self.clock.as_ref(),
        );
        tally.detected = suppressed.kept.len();
        if suppressed.kept.is_empty() {
            return self.finish(Verdict::Allow, Reason::NoFaces, &tally, total);
        }

        // ClassifyingFaces
        for (index, detection) in suppressed.kept.iter().enumerate() {
            if total.expired() {
                return self.timed_out(Stage::ClassifyingFaces, &tally, total);
            }
            match self.classify_face(image, index, detection) {
                Some(score) if score.is_blocked => {
                    tally.classified += 1;
                    let reason = Reason::BlockedFace {
                        index,
                        score: score.blocked,
                    };
                    return self.finish(Verdict::Block, reason, &tally, total);
                }
                Some(_) => tally.classified += 1,
                None => tally.skipped += 1,
            }
        }

        self.finish(Verdict::Allow, Reason::NoBlockedFace, &tally, total)
    }

    /// Crop, preprocess, and classify one face. `None` means the face was skipped.
    fn classify_face(
        &self,
        image: &RgbImage,
        index: usize,
        detection: &Detection,
    ) -> Option<FaceScore> {
        let (width, height) = image.dimensions();
        let clamped = Detection::new(detection.bbox.clamp(width, height), detection.score);
        let Some(crop) = FaceCrop::from_detection(&clamped, width, height) else {
            warn!(
                "skipping face {index}: degenerate crop {:?} in {width}x{height} image",
                clamped.bbox
            );
            return None;
        };

        let face = crop.extract(image);
        let input = match image_to_tensor(
            &face,
            self.classifier.engine().input_size(),
            &self.config.preprocess.classifier,
        ) {
            Ok(input) => input,
            Err(e) => {
                warn!("skipping face {index}: failed to prepare classifier input: {e:#}");
                return None;
            }
        };

        match self.classifier.classify(input) {
            Ok(result) => {
                debug!(
                    "face {index} at {}x{}+{}+{}: blocked={:.3} allowed={:.3}",
                    crop.width, crop.height, crop.x, crop.y, result.blocked, result.allowed
                );
                Some(FaceScore {
                    blocked: result.blocked,
                    is_blocked: result.is_blocked(),
                })
            }
            Err(err @ ClassifyError::InvalidOutput { .. }) => {
                warn!("skipping face {index}: {err}");
                None
            }
            Err(err @ ClassifyError::Engine(_)) => {
                warn!("skipping face {index}: {err}");
                None
            }
        }
    }

    fn timed_out(&self, stage: Stage, tally: &Tally, total: &Budget<'_>) -> Outcome {
        let verdict = match self.config.timeout_policy {
            TimeoutPolicy::FailOpen => Verdict::Allow,
            TimeoutPolicy::FailClosed => Verdict::Block,
        };
        warn!(
            "checkpoint budget exceeded during {stage} after {:?}; {} ({})",
            total.elapsed(),
            verdict,
            self.config.timeout_policy
        );
        self.finish(verdict, Reason::Timeout { stage }, tally, total)
    }

    fn failed(&self, error: PipelineError, total: &Budget<'_>) -> Outcome {
        warn!("invocation aborted: {error}; defaulting to {}", Verdict::Allow);
        self.finish(
            Verdict::Allow,
            Reason::Failed(error),
            &Tally::default(),
            total,
        )
    }

    fn finish(&self, verdict: Verdict, reason: Reason, tally: &Tally, total: &Budget<'_>) -> Outcome {
        let outcome = Outcome {
            verdict,
            reason,
            faces_detected: tally.detected,
            faces_classified: tally.classified,
            faces_skipped: tally.skipped,
            elapsed: total.elapsed(),
        };
        debug!(
            "{} -> {} ({}) faces={} classified={} skipped={} elapsed={:?}",
            Stage::Done,
            outcome.verdict,
            outcome.reason,
            outcome.faces_detected,
            outcome.faces_classified,
            outcome.faces_skipped,
            outcome.elapsed
        );
        outcome
    }
}

#[derive(Debug, Clone, Copy)]
struct FaceScore {
    blocked: f32,
    is_blocked: bool,
}
