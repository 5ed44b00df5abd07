mod args;
mod config;
mod input;
mod stats;

use std::fs::{self, File};

use anyhow::{Context, Result};
use clap::Parser;
use facegate_core::{DecisionPipeline, Engines, Outcome, PipelineConfig};
use facegate_utils::{configure_telemetry, init_logging, load_image, normalize_path};
use log::{info, warn};
use serde::Serialize;

use crate::{
    args::GateArgs,
    config::{apply_cli_overrides, load_settings},
    input::collect_images,
    stats::BatchStats,
};

#[derive(Debug, Serialize)]
struct VerdictRecord {
    image: String,
    verdict: String,
    reason: String,
    faces_detected: usize,
    faces_classified: usize,
    faces_skipped: usize,
    elapsed_ms: f64,
}

impl VerdictRecord {
    fn new(image: String, outcome: &Outcome) -> Self {
        Self {
            image,
            verdict: outcome.verdict.to_string(),
            reason: outcome.reason.to_string(),
            faces_detected: outcome.faces_detected,
            faces_classified: outcome.faces_classified,
            faces_skipped: outcome.faces_skipped,
            elapsed_ms: outcome.elapsed.as_secs_f64() * 1000.0,
        }
    }
}

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = GateArgs::parse();

    let input_path = normalize_path(&args.input)?;
    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args)?;
    if let Some(path) = args.write_config.as_ref() {
        settings.save_to_path(path)?;
        info!("Wrote effective settings to {}", path.display());
    }
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    let images = collect_images(&input_path)?;
    if images.is_empty() {
        anyhow::bail!(
            "no images found at {} (supported extensions: jpg, jpeg, png, bmp, webp)",
            input_path.display()
        );
    }

    info!(
        "facegate-core {}: loading detector {} and classifier {}",
        facegate_core::version(),
        settings.models.detector_path.display(),
        settings.models.classifier_path.display()
    );
    let engines = Engines::initialize(&settings.models).context("failed to initialize models")?;
    let pipeline = DecisionPipeline::new(&engines, PipelineConfig::from(&settings));
    info!(
        "Processing {} image(s) (timeout policy: {})...",
        images.len(),
        settings.timeout_policy
    );

    let mut stats = BatchStats::default();
    let mut results = Vec::with_capacity(images.len());
    for image_path in images {
        let label = image_path.display().to_string();
        let image = match load_image(&image_path) {
            Ok(image) => image,
            Err(err) => {
                warn!("Failed to process {label}: {err:#}");
                stats.record_failure();
                continue;
            }
        };
        let outcome = pipeline.evaluate(&image);
        info!(
            "{label} -> {} ({}, {} face(s))",
            outcome.verdict, outcome.reason, outcome.faces_detected
        );
        stats.record(&label, outcome.elapsed, outcome.is_blocked());
        results.push(VerdictRecord::new(label, &outcome));
    }
    stats.log_summary();

    if results.is_empty() {
        anyhow::bail!("all images failed to load; cannot produce output");
    }

    if let Some(json_path) = args.json.as_ref() {
        if let Some(dir) = json_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let file = File::create(json_path)
            .with_context(|| format!("failed to create {}", json_path.display()))?;
        serde_json::to_writer_pretty(file, &results)
            .with_context(|| format!("failed to write verdict JSON to {}", json_path.display()))?;
        info!("Wrote verdicts to {}", json_path.display());
    } else {
        let json = serde_json::to_string_pretty(&results).context("failed to serialize verdicts")?;
        println!("{json}");
    }

    Ok(())
}
