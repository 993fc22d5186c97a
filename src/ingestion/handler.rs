//! Ingest Handler - the per-file pipeline
//!
//! Validator -> Converter -> Outcome Router for one dropped file, plus the
//! state owned by a single watcher: the row-id counter, aggregate stats and
//! the optional journal. Every steady-state error is turned into an outcome
//! and a routing decision here; nothing below this point stops the loop.

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::ingestion::batch::{AuditColumns, RowIdCounter};
use crate::ingestion::converter::Converter;
use crate::ingestion::journal::IngestJournal;
use crate::ingestion::router::{OutcomeRouter, RouteTarget};
use crate::ingestion::stats::{format_size, timed, IngestStats};
use crate::ingestion::validator;
use crate::ingestion::writer::{ArtifactRef, ArtifactWriter};
use crate::schema::SchemaDescriptor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Result of running one file through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Success {
        artifact_path: PathBuf,
        size_bytes: u64,
        duration_seconds: f64,
        rows: usize,
    },
    /// The artifact already existed and was left untouched
    Skipped { artifact_path: PathBuf },
    Failure { kind: String, reason: String },
}

impl IngestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestOutcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, IngestOutcome::Failure { .. })
    }
}

/// Everything that happened to one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub run_id: String,
    pub source: PathBuf,
    pub source_bytes: u64,
    pub outcome: IngestOutcome,
    /// Where the source went; `None` when routing failed
    pub routed: Option<RouteTarget>,
    pub route_error: Option<String>,
}

pub struct IngestHandler {
    schema: SchemaDescriptor,
    converter: Converter,
    writer: ArtifactWriter,
    router: OutcomeRouter,
    output_dir: PathBuf,
    row_ids: RowIdCounter,
    stats: IngestStats,
    journal: Option<IngestJournal>,
}

impl IngestHandler {
    /// Validate the config and load the schema. Any failure here is fatal.
    pub fn new(config: &IngestConfig) -> Result<Self> {
        config.validate()?;
        let schema = SchemaDescriptor::load(&config.schema_file)?;
        info!(
            "Loaded schema {} with {} columns",
            config.schema_file.display(),
            schema.len()
        );
        Ok(Self::with_schema(config, schema))
    }

    pub fn with_schema(config: &IngestConfig, schema: SchemaDescriptor) -> Self {
        Self {
            schema,
            converter: Converter::from_config(config),
            writer: ArtifactWriter::new(),
            router: OutcomeRouter::from_config(config),
            output_dir: config.output_dir.clone(),
            row_ids: RowIdCounter::new(),
            stats: IngestStats::new(),
            journal: config.journal_file.as_ref().map(|p| IngestJournal::new(p.clone())),
        }
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Id the next committed row will receive.
    pub fn next_row_id(&self) -> u64 {
        self.row_ids.peek()
    }

    /// Run one file through the pipeline and route it.
    ///
    /// Returns `None` when the path is not a regular file any more (already
    /// handled, removed by the producer, or a directory).
    pub fn handle(&mut self, path: &Path) -> Option<FileReport> {
        if !path.is_file() {
            debug!("Ignoring {}: not a regular file", path.display());
            return None;
        }

        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("ingest", run_id = %run_id, file = %path.display());
        let _enter = span.enter();

        let source_bytes = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        let outcome = if !is_csv(path) {
            warn!("Failed: file {} is not in CSV format", path.display());
            IngestOutcome::Failure {
                kind: "unsupported".to_string(),
                reason: format!("{} is not a CSV file", path.display()),
            }
        } else {
            let (result, elapsed) = timed("convert", || self.process(path));
            self.outcome_of(path, source_bytes, result, elapsed.as_secs_f64())
        };

        let (routing, _) = timed("route", || match &outcome {
            IngestOutcome::Failure { .. } => self.router.route_failure(path),
            _ => self.router.route_success(path),
        });

        let (routed, route_error) = match routing {
            Ok(target) => {
                debug!("Routed source: {:?}", target);
                (Some(target), None)
            }
            Err(e) => {
                error!("{}; source left in {}", e, path.display());
                (None, Some(e.to_string()))
            }
        };

        let report = FileReport {
            run_id,
            source: path.to_path_buf(),
            source_bytes,
            outcome,
            routed,
            route_error,
        };

        self.stats.record(&report);
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&report) {
                warn!("Failed to append to journal {}: {}", journal.path().display(), e);
            }
        }

        Some(report)
    }

    fn outcome_of(
        &self,
        path: &Path,
        source_bytes: u64,
        result: Result<ArtifactRef>,
        duration_seconds: f64,
    ) -> IngestOutcome {
        match result {
            Ok(artifact) => {
                info!(
                    "Success: converted {} ({}) to {} ({}), {} rows, execution time {:.2}s",
                    path.display(),
                    format_size(source_bytes),
                    artifact.path.display(),
                    format_size(artifact.size_bytes),
                    artifact.rows,
                    duration_seconds
                );
                IngestOutcome::Success {
                    artifact_path: artifact.path,
                    size_bytes: artifact.size_bytes,
                    duration_seconds,
                    rows: artifact.rows,
                }
            }
            Err(IngestError::ArtifactExists(artifact_path)) => {
                warn!(
                    "Skipped {}: artifact {} already exists",
                    path.display(),
                    artifact_path.display()
                );
                IngestOutcome::Skipped { artifact_path }
            }
            Err(e) => {
                error!(kind = e.kind(), "Failed to convert {}: {}", path.display(), e);
                IngestOutcome::Failure {
                    kind: e.kind().to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Read, normalize, validate, stamp and write. The row-id counter only
    /// advances once the artifact is in place.
    fn process(&mut self, path: &Path) -> Result<ArtifactRef> {
        let raw = fs::read(path)
            .map_err(|e| IngestError::Parse(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut batch = self.converter.convert(&raw)?;
        if batch.dropped_rows() > 0 {
            debug!(dropped = batch.dropped_rows(), "Dropped rows with missing fields");
        }

        validator::check(&batch, &self.schema)?;

        batch.append_audit(AuditColumns::new(Utc::now(), self.row_ids.peek()));
        let destination = ArtifactWriter::artifact_path(&self.output_dir, path);
        let artifact = self.writer.serialize(&batch, &destination)?;

        self.row_ids.advance(batch.row_count());
        Ok(artifact)
    }
}

/// Files are accepted on a `.csv` extension, in any letter case.
pub fn is_csv(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.to_string_lossy().eq_ignore_ascii_case("csv"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_csv() {
        assert!(is_csv(Path::new("in/a.csv")));
        assert!(is_csv(Path::new("in/A.CSV")));
        assert!(!is_csv(Path::new("in/a.txt")));
        assert!(!is_csv(Path::new("in/csv")));
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = IngestOutcome::Skipped {
            artifact_path: PathBuf::from("out/a.parquet"),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["artifact_path"], "out/a.parquet");
    }
}
