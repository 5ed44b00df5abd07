//! Command-line argument definitions for facegate.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Decide BLOCK or ALLOW for images based on the faces they contain.
#[derive(Debug, Parser)]
#[command(name = "facegate", author, version, about)]
pub struct GateArgs {
    /// Path to an image file or a directory containing images.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to the face detector ONNX model (overrides settings).
    #[arg(long, value_name = "PATH")]
    pub detector_model: Option<PathBuf>,

    /// Path to the face classifier ONNX model (overrides settings).
    #[arg(long, value_name = "PATH")]
    pub classifier_model: Option<PathBuf>,

    /// Optional settings JSON. Defaults to `config/facegate.json` when present, otherwise built-in parameters.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the detector score threshold.
    #[arg(long)]
    pub score_threshold: Option<f32>,

    /// Override the NMS IoU threshold.
    #[arg(long)]
    pub nms_threshold: Option<f32>,

    /// Override the overall per-image budget in milliseconds; stage budgets scale with it.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Report BLOCK instead of ALLOW when a budget runs out.
    #[arg(long, action = ArgAction::SetTrue)]
    pub fail_closed: bool,

    /// Write verdicts to a JSON file instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Save the effective settings (file plus overrides) as JSON before gating.
    #[arg(long, value_name = "PATH")]
    pub write_config: Option<PathBuf>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,
}
