//! Seams to the tensor execution engines.
//!
//! The pipeline only needs two things from an inference backend: raw anchor
//! tensors for a preprocessed full image, and two raw scores for a preprocessed
//! face crop. Implementations must be shareable across threads and must not
//! mutate loaded weights while inferring.

use anyhow::Result;
use facegate_utils::config::ModelInput;
use tract_onnx::prelude::Tensor;

/// Desired input resolution of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<ModelInput> for InputSize {
    fn from(input: ModelInput) -> Self {
        InputSize::new(input.width, input.height)
    }
}

/// Raw detector output: per-anchor `[background, foreground]` confidences and
/// normalized `[x1, y1, x2, y2]` box offsets, both flattened row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorOutput {
    pub confidence: Vec<f32>,
    pub boxes: Vec<f32>,
}

impl AnchorOutput {
    pub fn new(confidence: Vec<f32>, boxes: Vec<f32>) -> Self {
        Self { confidence, boxes }
    }

    /// Number of anchors that have both a confidence pair and a full box.
    pub fn anchor_count(&self) -> usize {
        (self.confidence.len() / 2).min(self.boxes.len() / 4)
    }

    /// `true` when the two tensors disagree on the anchor count.
    pub fn is_ragged(&self) -> bool {
        self.confidence.len() % 2 != 0
            || self.boxes.len() % 4 != 0
            || self.confidence.len() / 2 != self.boxes.len() / 4
    }
}

/// Face detector backend.
pub trait DetectorEngine: Send + Sync {
    /// Resolution the preprocessed image must be resized to.
    fn input_size(&self) -> InputSize;

    /// Run the detector on a `[1, 3, H, W]` tensor.
    fn detect(&self, input: Tensor) -> Result<AnchorOutput>;
}

/// Two-class face classifier backend.
pub trait ClassifierEngine: Send + Sync {
    /// Resolution face crops must be resized to.
    fn input_size(&self) -> InputSize;

    /// Run the classifier on a `[1, 3, H, W]` tensor and return its raw scores,
    /// `[blocked, allowed]` for a well-formed model.
    fn classify(&self, input: Tensor) -> Result<Vec<f32>>;
}
