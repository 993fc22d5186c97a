//! Ingest Journal
//!
//! Append-only JSON-lines record of every file report.

use crate::error::{IngestError, Result};
use crate::ingestion::handler::FileReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One journal line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub report: FileReport,
}

#[derive(Debug, Clone)]
pub struct IngestJournal {
    path: PathBuf,
}

impl IngestJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, report: &FileReport) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| IngestError::Write(format!("Failed to open journal {:?}: {}", self.path, e)))?;

        let entry = JournalEntry {
            timestamp: Utc::now(),
            report: report.clone(),
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| IngestError::Write(format!("Failed to serialize journal entry: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| IngestError::Write(format!("Failed to write journal {:?}: {}", self.path, e)))?;

        Ok(())
    }

    /// Read every entry back, oldest first.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                serde_json::from_str(l)
                    .map_err(|e| IngestError::Parse(format!("Corrupt journal line: {}", e)))
            })
            .collect()
    }
}
