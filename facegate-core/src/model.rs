use std::{fmt::Write, path::Path, sync::Arc};

use anyhow::{Context, Result};
use facegate_utils::config::ModelSettings;
use log::{debug, info, warn};
use tract_onnx::prelude::{
    Datum, Framework, Graph, InferenceFact, InferenceModelExt, IntoTensor, SimplePlan, Tensor,
    TypedFact, TypedOp, tvec,
};

use crate::engine::{AnchorOutput, ClassifierEngine, DetectorEngine, InputSize};
use crate::error::{InitError, ModelRole};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Load an ONNX graph with its input fixed to `[1, 3, H, W]` f32.
///
/// An optimized plan is tried first; graphs that fail optimization fall back to a
/// decluttered plan, which is slower but accepts more operator combinations.
fn load_plan(path: &Path, input: InputSize, label: &str) -> Result<RunnableModel> {
    anyhow::ensure!(path.exists(), "model file not found: {}", path.display());

    match build_plan(path, input, true) {
        Ok(plan) => {
            debug!(
                "{label} model {} optimized successfully ({}x{})",
                path.display(),
                input.width,
                input.height
            );
            Ok(plan)
        }
        Err(opt_err) => {
            let mut chain_msg = String::new();
            for cause in opt_err.chain() {
                let _ = writeln!(&mut chain_msg, "  - {cause}");
            }
            warn!(
                "{label} model {} failed optimized load; falling back to decluttered graph.\nError chain:\n{}",
                path.display(),
                chain_msg.trim_end()
            );
            build_plan(path, input, false).with_context(|| {
                format!("fallback to decluttered {label} graph failed after optimize error: {opt_err}")
            })
        }
    }
}

fn build_plan(path: &Path, input: InputSize, optimized: bool) -> Result<RunnableModel> {
    let fact = InferenceFact::dt_shape(
        f32::datum_type(),
        tvec![1, 3, input.height as usize, input.width as usize],
    );
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?
        .with_input_fact(0, fact)
        .map_err(|e| anyhow::anyhow!("unable to set input fact: {e}"))?;

    if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
    } else {
        model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
    }
}

fn run_plan(plan: &RunnableModel, input: Tensor) -> Result<Vec<Tensor>> {
    let outputs = plan
        .run(tvec![input.into()])
        .map_err(|e| anyhow::anyhow!("execution failed: {e}"))?;
    Ok(outputs.into_iter().map(|v| v.into_tensor()).collect())
}

fn flatten_f32(tensor: &Tensor, name: &str) -> Result<Vec<f32>> {
    Ok(tensor
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("{name} output is not f32: {e}"))?
        .to_vec())
}

/// Anchor-based face detector backed by tract.
///
/// The graph must expose two outputs: per-anchor `[background, foreground]`
/// confidences (`[1, N, 2]`) followed by normalized corner boxes (`[1, N, 4]`).
#[derive(Debug)]
pub struct OnnxDetector {
    plan: RunnableModel,
    input_size: InputSize,
}

impl OnnxDetector {
    pub fn load<P: AsRef<Path>>(path: P, input_size: InputSize) -> Result<Self> {
        let plan = load_plan(path.as_ref(), input_size, "detector")?;
        Ok(Self { plan, input_size })
    }
}

impl DetectorEngine for OnnxDetector {
    fn input_size(&self) -> InputSize {
        self.input_size
    }

    fn detect(&self, input: Tensor) -> Result<AnchorOutput> {
        let outputs = run_plan(&self.plan, input).context("detector")?;
        anyhow::ensure!(
            outputs.len() >= 2,
            "detector produced {} output(s); expected confidence and boxes",
            outputs.len()
        );
        Ok(AnchorOutput::new(
            flatten_f32(&outputs[0], "confidence")?,
            flatten_f32(&outputs[1], "boxes")?,
        ))
    }
}

/// Two-class face classifier backed by tract.
#[derive(Debug)]
pub struct OnnxClassifier {
    plan: RunnableModel,
    input_size: InputSize,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(path: P, input_size: InputSize) -> Result<Self> {
        let plan = load_plan(path.as_ref(), input_size, "classifier")?;
        Ok(Self { plan, input_size })
    }
}

impl ClassifierEngine for OnnxClassifier {
    fn input_size(&self) -> InputSize {
        self.input_size
    }

    fn classify(&self, input: Tensor) -> Result<Vec<f32>> {
        let outputs = run_plan(&self.plan, input).context("classifier")?;
        let first = outputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("classifier produced no outputs"))?;
        flatten_f32(first, "scores")
    }
}

/// Loaded, shareable inference engines.
///
/// Constructing this value is the only initialization step; a pipeline built
/// from it never needs to re-check whether models are loaded.
#[derive(Clone)]
pub struct Engines {
    pub detector: Arc<dyn DetectorEngine>,
    pub classifier: Arc<dyn ClassifierEngine>,
}

impl std::fmt::Debug for Engines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engines")
            .field("detector_input", &self.detector.input_size())
            .field("classifier_input", &self.classifier.input_size())
            .finish()
    }
}

impl Engines {
    /// Wrap already-constructed engines.
    pub fn new(detector: Arc<dyn DetectorEngine>, classifier: Arc<dyn ClassifierEngine>) -> Self {
        Self {
            detector,
            classifier,
        }
    }

    /// Load both ONNX models described by `settings`.
    pub fn initialize(settings: &ModelSettings) -> Result<Self, InitError> {
        let detector = load_role(
            ModelRole::Detector,
            &settings.detector_path,
            settings.detector_input.into(),
            |path, size| OnnxDetector::load(path, size),
        )?;
        let classifier = load_role(
            ModelRole::Classifier,
            &settings.classifier_path,
            settings.classifier_input.into(),
            |path, size| OnnxClassifier::load(path, size),
        )?;
        info!(
            "models initialized: detector {} ({}x{}), classifier {} ({}x{})",
            settings.detector_path.display(),
            settings.detector_input.width,
            settings.detector_input.height,
            settings.classifier_path.display(),
            settings.classifier_input.width,
            settings.classifier_input.height
        );
        Ok(Self::new(Arc::new(detector), Arc::new(classifier)))
    }
}

fn load_role<T>(
    role: ModelRole,
    path: &Path,
    size: InputSize,
    load: impl FnOnce(&Path, InputSize) -> Result<T>,
) -> Result<T, InitError> {
    if !path.exists() {
        return Err(InitError::ModelMissing {
            role,
            path: path.to_path_buf(),
        });
    }
    load(path, size).map_err(|e| InitError::LoadFailed {
        role,
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })
}
