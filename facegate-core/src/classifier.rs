use std::sync::Arc;

use log::trace;
use thiserror::Error;
use tract_onnx::prelude::Tensor;

use crate::engine::ClassifierEngine;

/// Numerically stable two-class softmax.
///
/// The larger logit is subtracted before exponentiating, so the result is
/// unchanged when the same constant is added to both inputs and never
/// overflows for finite logits.
#[inline]
pub fn softmax2(a: f32, b: f32) -> (f32, f32) {
    let max = a.max(b);
    let ea = (a - max).exp();
    let eb = (b - max).exp();
    let sum = ea + eb;
    (ea / sum, eb / sum)
}

/// Post-softmax probabilities for one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub blocked: f32,
    pub allowed: f32,
}

impl ClassificationResult {
    /// Build a result from the raw `[blocked, allowed]` logits.
    pub fn from_logits(blocked: f32, allowed: f32) -> Self {
        let (blocked, allowed) = softmax2(blocked, allowed);
        Self { blocked, allowed }
    }

    /// Ties count as blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked >= self.allowed
    }
}

/// Why a single face could not be classified.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classifier returned {width} score(s); expected 2 finite values")]
    InvalidOutput { width: usize },
    #[error("classifier inference failed: {0}")]
    Engine(String),
}

/// Stateless per-face classifier over a shared engine.
#[derive(Clone)]
pub struct FaceClassifier {
    engine: Arc<dyn ClassifierEngine>,
}

impl std::fmt::Debug for FaceClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceClassifier")
            .field("input_size", &self.engine.input_size())
            .finish()
    }
}

impl FaceClassifier {
    pub fn new(engine: Arc<dyn ClassifierEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &dyn ClassifierEngine {
        self.engine.as_ref()
    }

    /// Classify one preprocessed face tensor.
    ///
    /// Only the first two scores are read. Fewer than two, or a non-finite
    /// logit, is reported as [`ClassifyError::InvalidOutput`].
    pub fn classify(&self, input: Tensor) -> Result<ClassificationResult, ClassifyError> {
        let scores = self
            .engine
            .classify(input)
            .map_err(|e| ClassifyError::Engine(format!("{e:#}")))?;
        let (blocked, allowed) = match scores.as_slice() {
            [a, b, ..] if a.is_finite() && b.is_finite() => (*a, *b),
            other => {
                return Err(ClassifyError::InvalidOutput { width: other.len() });
            }
        };
        let result = ClassificationResult::from_logits(blocked, allowed);
        trace!(
            "classifier logits=({blocked:.3}, {allowed:.3}) probabilities=({:.3}, {:.3})",
            result.blocked, result.allowed
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InputSize;
    use anyhow::Result;

    struct FixedScores(Vec<f32>);

    impl ClassifierEngine for FixedScores {
        fn input_size(&self) -> InputSize {
            InputSize::new(2, 2)
        }

        fn classify(&self, _input: Tensor) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl ClassifierEngine for Failing {
        fn input_size(&self) -> InputSize {
            InputSize::new(2, 2)
        }

        fn classify(&self, _input: Tensor) -> Result<Vec<f32>> {
            anyhow::bail!("extractor failed")
        }
    }

    fn input() -> Tensor {
        Tensor::zero::<f32>(&[1, 3, 2, 2]).unwrap()
    }

    #[test]
    fn softmax2_sums_to_one() {
        for (a, b) in [
            (0.0, 0.0),
            (1.0, -1.0),
            (-300.0, 300.0),
            (88.0, 89.0),
            (f32::MAX, f32::MIN),
            (1e-20, -1e-20),
        ] {
            let (p, q) = softmax2(a, b);
            assert!(p.is_finite() && q.is_finite(), "non-finite for ({a}, {b})");
            assert!((p + q - 1.0).abs() < 1e-5, "sum {} for ({a}, {b})", p + q);
        }
    }

    #[test]
    fn softmax2_is_shift_invariant() {
        let (p, q) = softmax2(0.3, 1.7);
        for shift in [-1000.0, -3.5, 0.0, 42.0, 1000.0] {
            let (ps, qs) = softmax2(0.3 + shift, 1.7 + shift);
            assert!((p - ps).abs() < 1e-4, "shift {shift}");
            assert!((q - qs).abs() < 1e-4, "shift {shift}");
        }
    }

    #[test]
    fn equal_logits_tie_counts_as_blocked() {
        let result = ClassificationResult::from_logits(2.0, 2.0);
        assert_eq!(result.blocked, 0.5);
        assert!(result.is_blocked());
    }

    #[test]
    fn classify_applies_softmax_to_first_two_scores() {
        let classifier = FaceClassifier::new(Arc::new(FixedScores(vec![0.0, 0.0, 9.0])));
        let result = classifier.classify(input()).expect("valid output");
        assert_eq!(result.blocked, 0.5);
        assert_eq!(result.allowed, 0.5);
    }

    #[test]
    fn short_output_is_invalid() {
        let classifier = FaceClassifier::new(Arc::new(FixedScores(vec![1.0])));
        let err = classifier.classify(input()).unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidOutput { width: 1 }));
    }

    #[test]
    fn non_finite_logit_is_invalid() {
        let classifier = FaceClassifier::new(Arc::new(FixedScores(vec![f32::NAN, 1.0])));
        let err = classifier.classify(input()).unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidOutput { width: 2 }));
    }

    #[test]
    fn engine_failure_is_reported() {
        let classifier = FaceClassifier::new(Arc::new(Failing));
        let err = classifier.classify(input()).unwrap_err();
        assert!(err.to_string().contains("extractor failed"));
    }
}
