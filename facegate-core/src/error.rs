use std::path::PathBuf;

use thiserror::Error;

/// Which of the two models an initialization error concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Detector,
    Classifier,
}

impl std::fmt::Display for ModelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ModelRole::Detector => "detector",
            ModelRole::Classifier => "classifier",
        })
    }
}

/// Failure to construct the inference engines.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("{role} model not found: {}", path.display())]
    ModelMissing { role: ModelRole, path: PathBuf },

    #[error("failed to load {role} model from {}: {reason}", path.display())]
    LoadFailed {
        role: ModelRole,
        path: PathBuf,
        reason: String,
    },
}

/// Conditions that abort a single invocation.
///
/// The pipeline never propagates these; they are carried in the outcome next to
/// the conservative verdict.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("image dimensions are zero")]
    EmptyImage,

    #[error("unsupported image layout: {0} channel(s)")]
    UnsupportedChannels(u8),

    #[error("failed to prepare model input: {0}")]
    Preprocess(String),

    #[error("detector inference failed: {0}")]
    Detector(String),
}
