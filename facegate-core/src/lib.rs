//! Core face gating primitives.
//!
//! This crate decodes anchor-based face detector output, suppresses overlapping
//! candidates, classifies each surviving face, and folds the results into a
//! single block/allow verdict under wall-clock budgets. Inference runs through
//! the [`DetectorEngine`] and [`ClassifierEngine`] traits; `tract-onnx` backed
//! implementations live in [`model`].

/// Monotonic clock and budgets.
pub mod budget;
/// Per-face classification and softmax.
pub mod classifier;
/// Integer face crops.
pub mod crop;
/// Anchor decoding (score filtering, coordinate mapping).
pub mod decode;
/// Inference engine traits.
pub mod engine;
pub mod error;
/// Box geometry: pixel mapping, IoU, clamping.
pub mod geometry;
/// ONNX model loading and execution.
pub mod model;
/// Staged decision pipeline.
pub mod pipeline;
/// Image pre-processing (resizing, tensor conversion).
pub mod preprocess;
/// Greedy non-maximum suppression.
pub mod suppress;

pub use budget::{Budget, Clock, MonotonicClock};
pub use classifier::{ClassificationResult, ClassifyError, FaceClassifier, softmax2};
pub use crop::FaceCrop;
pub use decode::{DecodeConfig, DecodeOutput, decode_anchors};
pub use engine::{AnchorOutput, ClassifierEngine, DetectorEngine, InputSize};
pub use error::{InitError, ModelRole, PipelineError};
pub use geometry::{BoundingBox, Detection, IOU_EPSILON};
pub use model::{Engines, OnnxClassifier, OnnxDetector};
pub use pipeline::{DecisionPipeline, Outcome, PipelineConfig, Reason, Stage, Verdict};
pub use preprocess::{
    CLASSIFIER_NORMALIZATION, DETECTOR_NORMALIZATION, PreprocessConfig, image_to_tensor,
};
pub use suppress::{SuppressConfig, SuppressOutput, suppress};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
