//! Common helpers shared across facegate crates.

/// Application configuration and settings management.
pub mod config;
/// Image loading, channel validation, resizing, and tensor conversion.
pub mod image_utils;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use image_utils::{
    ChannelOrder, Normalization, SourceLayout, load_image, normalized_chw, resize_rgb,
    source_layout, to_rgb,
};
pub use telemetry::{
    StageTimer, configure as configure_telemetry, stage_timer, telemetry_allows, telemetry_level,
};

/// Initialize logging once for CLI and embedding hosts.
///
/// This function respects the `RUST_LOG` environment variable if it is set.
/// Otherwise, it falls back to the provided default filter level.
///
/// # Arguments
///
/// * `default_filter` - The `LevelFilter` to use if `RUST_LOG` is not set.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module("facegate::telemetry", LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
///
/// # Arguments
///
/// * `path` - The path to validate and normalize.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
