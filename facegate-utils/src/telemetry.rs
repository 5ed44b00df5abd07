//! Stage timing for optional telemetry.
//!
//! A [`StageTimer`] measures one scoped pipeline stage and logs its duration
//! under the `facegate::telemetry` target when dropped. Nothing is logged unless
//! [`configure`] switched telemetry on at or above the timer's level and the
//! global log filter admits it.

use std::{
    sync::atomic::{AtomicU8, Ordering},
    time::Instant,
};

use log::{Level, LevelFilter, log, log_enabled};

const TARGET: &str = "facegate::telemetry";

/// Most verbose level telemetry may log at; `LevelFilter::Off` (0) while disabled.
static THRESHOLD: AtomicU8 = AtomicU8::new(LevelFilter::Off as u8);

/// Logs the lifetime of a pipeline stage when dropped.
pub struct StageTimer {
    stage: &'static str,
    level: Option<Level>,
    started: Instant,
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        if let Some(level) = self.level {
            log!(
                target: TARGET,
                level,
                "{} took {:.2?}",
                self.stage,
                self.started.elapsed()
            );
        }
    }
}

/// Start timing `stage`; the result is logged at `level` if telemetry allows it.
pub fn stage_timer(stage: &'static str, level: Level) -> StageTimer {
    let level = (telemetry_allows(level) && log_enabled!(target: TARGET, level)).then_some(level);
    StageTimer {
        stage,
        level,
        started: Instant::now(),
    }
}

/// Switch telemetry on or off and set its verbosity.
///
/// Timers started afterwards use the new state.
pub fn configure(enabled: bool, level: LevelFilter) {
    let threshold = if enabled { level } else { LevelFilter::Off };
    THRESHOLD.store(threshold as u8, Ordering::Relaxed);
}

/// The verbosity telemetry currently logs at, `Off` when disabled.
pub fn telemetry_level() -> LevelFilter {
    LevelFilter::iter()
        .nth(usize::from(THRESHOLD.load(Ordering::Relaxed)))
        .unwrap_or(LevelFilter::Trace)
}

/// Whether a timer at `level` would be logged.
pub fn telemetry_allows(level: Level) -> bool {
    level <= telemetry_level()
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test: the threshold is process-global and tests run in parallel.
    #[test]
    fn configure_sets_threshold() {
        configure(true, LevelFilter::Info);
        assert_eq!(telemetry_level(), LevelFilter::Info);
        assert!(telemetry_allows(Level::Warn));
        assert!(telemetry_allows(Level::Info));
        assert!(!telemetry_allows(Level::Debug));

        configure(false, LevelFilter::Trace);
        assert_eq!(telemetry_level(), LevelFilter::Off);
        assert!(!telemetry_allows(Level::Error));
        assert!(stage_timer("disabled", Level::Error).level.is_none());

        configure(true, LevelFilter::Trace);
        assert!(telemetry_allows(Level::Trace));
        configure(false, LevelFilter::Off);
    }
}
