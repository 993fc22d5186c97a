use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Schema mismatch: missing columns {missing:?}, unexpected columns {extra:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        extra: Vec<String>,
    },

    #[error("Artifact already exists: {}", .0.display())]
    ArtifactExists(PathBuf),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Route error: {0}")]
    Route(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// True for the non-fatal "artifact already exists" skip.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, IngestError::ArtifactExists(_))
    }

    /// Short machine-friendly label used in logs and the journal.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Config(_) => "config",
            IngestError::Parse(_) => "parse",
            IngestError::SchemaMismatch { .. } => "schema_mismatch",
            IngestError::ArtifactExists(_) => "already_exists",
            IngestError::Write(_) => "write",
            IngestError::Route(_) => "route",
            IngestError::Watch(_) => "watch",
            IngestError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
