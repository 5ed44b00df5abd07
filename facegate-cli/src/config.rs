//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use facegate_utils::{
    config::{AppSettings, TimeoutPolicy, default_settings_path},
    normalize_path,
};
use log::{debug, info};

use crate::args::GateArgs;

/// Load gate settings.
///
/// An explicit `--config` path must exist. Without one, `config/facegate.json`
/// is used when present and built-in defaults otherwise.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    let (path, explicit) = match config_path {
        Some(path) => (normalize_path(path)?, true),
        None => (default_settings_path(), false),
    };
    if !explicit && !path.exists() {
        debug!(
            "No settings file at {}; using built-in gate defaults",
            path.display()
        );
        return Ok(AppSettings::default());
    }

    let settings = AppSettings::load_from_path(&path)
        .with_context(|| format!("failed to load gate settings from {}", path.display()))?;
    info!(
        "Loaded gate settings from {} (timeout policy {}, total budget {} ms)",
        path.display(),
        settings.timeout_policy,
        settings.budgets.total_ms
    );
    Ok(settings)
}

/// Apply command-line arguments to override loaded or default settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &GateArgs) -> Result<()> {
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            settings.telemetry.level = lower.clone();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
        }
    }

    if let Some(path) = args.detector_model.as_ref() {
        settings.models.detector_path = path.clone();
    }
    if let Some(path) = args.classifier_model.as_ref() {
        settings.models.classifier_path = path.clone();
    }
    if let Some(score) = args.score_threshold {
        settings.detection.score_threshold = score;
    }
    if let Some(nms) = args.nms_threshold {
        settings.detection.nms_threshold = nms;
    }
    if let Some(total_ms) = args.timeout_ms {
        settings.budgets.scale_to_total(total_ms);
    }
    if args.fail_closed {
        settings.timeout_policy = TimeoutPolicy::FailClosed;
    }

    settings
        .validate()
        .context("invalid settings after applying command-line overrides")
}
