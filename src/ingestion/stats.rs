//! Ingest Stats
//!
//! Counters and size/timing totals for one handler instance.

use crate::ingestion::handler::{FileReport, IngestOutcome};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestStats {
    pub files_succeeded: u64,
    pub files_failed: u64,
    pub files_skipped: u64,
    pub route_errors: u64,
    pub rows_written: u64,
    pub source_bytes: u64,
    pub artifact_bytes: u64,
    pub busy_seconds: f64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: &FileReport) {
        match &report.outcome {
            IngestOutcome::Success {
                size_bytes,
                duration_seconds,
                rows,
                ..
            } => {
                self.files_succeeded += 1;
                self.rows_written += *rows as u64;
                self.source_bytes += report.source_bytes;
                self.artifact_bytes += size_bytes;
                self.busy_seconds += duration_seconds;
            }
            IngestOutcome::Skipped { .. } => self.files_skipped += 1,
            IngestOutcome::Failure { .. } => self.files_failed += 1,
        }

        if report.route_error.is_some() {
            self.route_errors += 1;
        }
    }

    pub fn files_seen(&self) -> u64 {
        self.files_succeeded + self.files_failed + self.files_skipped
    }

    /// Artifact size as a fraction of source size, if anything was converted.
    pub fn compression_ratio(&self) -> Option<f64> {
        if self.source_bytes == 0 {
            None
        } else {
            Some(self.artifact_bytes as f64 / self.source_bytes as f64)
        }
    }
}

/// Human readable size: B, KB, MB or GB on a 1024 base.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.2} KB", b / KB)
    } else if b < KB * KB * KB {
        format!("{:.2} MB", b / (KB * KB))
    } else {
        format!("{:.2} GB", b / (KB * KB * KB))
    }
}

/// Run `f` and return its result with the elapsed time, logged at debug level.
pub fn timed<T>(stage: &str, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let out = f();
    let elapsed = start.elapsed();
    debug!(stage, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "stage finished");
    (out, elapsed)
}
