//! Runtime configuration
//!
//! Loaded from an optional YAML file; every key has a default matching the
//! directory layout the drop-folder scripts have always used.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Cell values treated as missing, same list pandas uses by default.
pub const DEFAULT_NULL_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// What happens to a source file once its artifact exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SuccessPolicy {
    /// Move into the success holding area as `<stem>_success.<ext>`
    #[default]
    Move,
    /// Remove the source file
    Delete,
}

impl FromStr for SuccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "move" => Ok(SuccessPolicy::Move),
            "delete" => Ok(SuccessPolicy::Delete),
            other => Err(format!("unknown success policy '{}' (expected move or delete)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Directory the producer drops files into
    pub input_dir: PathBuf,

    /// Where Parquet artifacts are written
    pub output_dir: PathBuf,

    /// Holding area for successfully converted source files
    pub success_dir: PathBuf,

    /// Holding area for rejected source files
    pub failed_dir: PathBuf,

    /// YAML schema declaring the expected columns
    pub schema_file: PathBuf,

    pub delimiter: char,

    /// Cell values that mark a field as missing
    pub null_values: Vec<String>,

    pub on_success: SuccessPolicy,

    /// Capacity of the event queue between the watcher and the loop
    pub queue_capacity: usize,

    /// Quiet period a file must see before it is dispatched, so a producer
    /// still writing or renaming it in is not read half way
    pub debounce_ms: u64,

    /// Process files already sitting in the input directory at startup
    pub scan_existing: bool,

    /// Optional JSON-lines journal of file outcomes
    pub journal_file: Option<PathBuf>,

    /// Optional log file, appended to alongside stderr
    pub log_file: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input_csv"),
            output_dir: PathBuf::from("output_parquet_success"),
            success_dir: PathBuf::from("output_parquet_success").join("output_csv_success"),
            failed_dir: PathBuf::from("output_failed"),
            schema_file: PathBuf::from("schema.yaml"),
            delimiter: ';',
            null_values: DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect(),
            on_success: SuccessPolicy::Move,
            queue_capacity: 1024,
            debounce_ms: 500,
            scan_existing: false,
            journal_file: None,
            log_file: None,
        }
    }
}

impl IngestConfig {
    /// Load configuration from a YAML file. An empty file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| {
            IngestError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(IngestError::Config(format!(
                "Delimiter {:?} must be a single ASCII character other than a quote or line break",
                self.delimiter
            )));
        }

        if self.debounce_ms == 0 {
            return Err(IngestError::Config("debounce_ms must be at least 1".to_string()));
        }

        if self.queue_capacity == 0 {
            return Err(IngestError::Config("queue_capacity must be at least 1".to_string()));
        }

        for (name, dir) in [
            ("output_dir", &self.output_dir),
            ("success_dir", &self.success_dir),
            ("failed_dir", &self.failed_dir),
        ] {
            if dir == &self.input_dir {
                return Err(IngestError::Config(format!(
                    "{} must differ from input_dir ({})",
                    name,
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
