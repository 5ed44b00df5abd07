//! Batch timing summary.

use std::time::Duration;

use log::{info, warn};
use serde::Serialize;

/// Per-image processing time above which a warning is logged.
pub const SLOW_IMAGE_THRESHOLD: Duration = Duration::from_millis(1_000);

#[derive(Debug, Default)]
pub struct BatchStats {
    samples: Vec<Duration>,
    blocked: usize,
    failed: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct BatchSummary {
    pub images: usize,
    pub blocked: usize,
    pub failed: usize,
    pub slow: usize,
    pub total_ms: f64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl BatchStats {
    pub fn record(&mut self, label: &str, elapsed: Duration, blocked: bool) {
        if elapsed > SLOW_IMAGE_THRESHOLD {
            warn!(
                "{label} took {:.1} ms (over {} ms)",
                as_ms(elapsed),
                SLOW_IMAGE_THRESHOLD.as_millis()
            );
        }
        if blocked {
            self.blocked += 1;
        }
        self.samples.push(elapsed);
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn summary(&self) -> BatchSummary {
        let total: Duration = self.samples.iter().sum();
        let images = self.samples.len();
        BatchSummary {
            images,
            blocked: self.blocked,
            failed: self.failed,
            slow: self
                .samples
                .iter()
                .filter(|d| **d > SLOW_IMAGE_THRESHOLD)
                .count(),
            total_ms: as_ms(total),
            avg_ms: if images == 0 {
                0.0
            } else {
                as_ms(total) / images as f64
            },
            min_ms: self.samples.iter().min().copied().map_or(0.0, as_ms),
            max_ms: self.samples.iter().max().copied().map_or(0.0, as_ms),
        }
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        match serde_json::to_string(&summary) {
            Ok(json) => info!("batch_summary {json}"),
            Err(err) => warn!("failed to serialize batch summary: {err}"),
        }
    }
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
