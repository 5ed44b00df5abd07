//! Shared configuration types consumed across the facegate workspace.
//!
//! These structures describe model locations, detection thresholds, stage budgets,
//! and telemetry preferences. They serialize to JSON so a host can keep them on
//! disk and the CLI can layer command-line overrides on top.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Detection parameters applied to raw detector output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Foreground confidence an anchor must exceed to become a candidate.
    pub score_threshold: f32,
    /// IoU above which a lower-scored candidate is suppressed.
    pub nms_threshold: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
        }
    }
}

/// Fixed input resolution of a model, in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInput {
    pub width: u32,
    pub height: u32,
}

impl ModelInput {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Locations and input resolutions of the detector and classifier graphs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
    /// ONNX face detector producing anchor confidences and box offsets.
    pub detector_path: PathBuf,
    /// ONNX two-class face classifier.
    pub classifier_path: PathBuf,
    pub detector_input: ModelInput,
    pub classifier_input: ModelInput,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            detector_path: PathBuf::from("models/face_detector_160x120.onnx"),
            classifier_path: PathBuf::from("models/face_classifier_32.onnx"),
            detector_input: ModelInput::new(160, 120),
            classifier_input: ModelInput::new(32, 32),
        }
    }
}

/// Wall-clock budgets, in milliseconds, for each pipeline checkpoint.
///
/// `total_ms`, `entry_checkpoint_ms`, and `decode_checkpoint_ms` are measured from
/// the start of the invocation. `decode_ms` and `suppress_ms` are measured from the
/// start of their own stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BudgetSettings {
    pub total_ms: u64,
    pub entry_checkpoint_ms: u64,
    pub decode_checkpoint_ms: u64,
    pub decode_ms: u64,
    pub suppress_ms: u64,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            total_ms: 10_000,
            entry_checkpoint_ms: 8_000,
            decode_checkpoint_ms: 7_000,
            decode_ms: 3_000,
            suppress_ms: 1_000,
        }
    }
}

impl BudgetSettings {
    pub fn total(&self) -> Duration {
        Duration::from_millis(self.total_ms)
    }

    pub fn entry_checkpoint(&self) -> Duration {
        Duration::from_millis(self.entry_checkpoint_ms)
    }

    pub fn decode_checkpoint(&self) -> Duration {
        Duration::from_millis(self.decode_checkpoint_ms)
    }

    pub fn decode(&self) -> Duration {
        Duration::from_millis(self.decode_ms)
    }

    pub fn suppress(&self) -> Duration {
        Duration::from_millis(self.suppress_ms)
    }

    /// Replace the overall limit with `total_ms`, scaling every checkpoint and
    /// stage budget by the same ratio so their proportions are kept.
    ///
    /// A zero overall limit has no proportions to keep; the default ones are
    /// used instead.
    pub fn scale_to_total(&mut self, total_ms: u64) {
        let base = if self.total_ms == 0 {
            BudgetSettings::default()
        } else {
            *self
        };
        let scale = |value: u64| {
            let scaled = u128::from(value) * u128::from(total_ms) / u128::from(base.total_ms);
            u64::try_from(scaled).unwrap_or(u64::MAX)
        };
        *self = BudgetSettings {
            total_ms,
            entry_checkpoint_ms: scale(base.entry_checkpoint_ms),
            decode_checkpoint_ms: scale(base.decode_checkpoint_ms),
            decode_ms: scale(base.decode_ms),
            suppress_ms: scale(base.suppress_ms),
        };
    }
}

/// Verdict produced when a checkpoint budget is exceeded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Treat a timeout as "nothing objectionable found".
    #[default]
    FailOpen,
    /// Treat a timeout as a block.
    FailClosed,
}

impl fmt::Display for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeoutPolicy::FailOpen => "fail_open",
            TimeoutPolicy::FailClosed => "fail_closed",
        })
    }
}

impl FromStr for TimeoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_open" | "open" => Ok(TimeoutPolicy::FailOpen),
            "fail_closed" | "closed" => Ok(TimeoutPolicy::FailClosed),
            other => Err(format!(
                "invalid timeout policy '{other}'; expected 'fail_open' or 'fail_closed'"
            )),
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent settings consumed by the CLI and embedding hosts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppSettings {
    pub models: ModelSettings,
    pub detection: DetectionSettings,
    pub budgets: BudgetSettings,
    pub timeout_policy: TimeoutPolicy,
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file. Missing fields fall back to defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let detection = &self.detection;
        anyhow::ensure!(
            detection.score_threshold.is_finite(),
            "score_threshold must be finite"
        );
        anyhow::ensure!(
            detection.nms_threshold.is_finite() && detection.nms_threshold >= 0.0,
            "nms_threshold must be a non-negative finite value (got {})",
            detection.nms_threshold
        );
        for (name, input) in [
            ("detector_input", self.models.detector_input),
            ("classifier_input", self.models.classifier_input),
        ] {
            anyhow::ensure!(
                input.width > 0 && input.height > 0,
                "{name} dimensions must be greater than zero"
            );
        }
        Ok(())
    }
}

/// Returns the default path for persisted settings (`config/facegate.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/facegate.json"))
        .unwrap_or_else(|_| PathBuf::from("config/facegate.json"))
}
