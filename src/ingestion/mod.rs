//! Ingestion Module
//!
//! Turns one dropped delimited file into a Parquet artifact:
//! - Parsing and normalization (converter, batch)
//! - Column-set validation against the schema (validator)
//! - Parquet serialization (writer)
//! - Success/failure routing of the source file (router)
//! - Per-instance counters and journal (stats, journal)

pub mod batch;
pub mod converter;
pub mod handler;
pub mod journal;
pub mod router;
pub mod stats;
pub mod validator;
pub mod writer;

pub use batch::{AuditColumns, RecordBatch, RowIdCounter, TextColumn, AUDIT_COLUMNS};
pub use converter::Converter;
pub use handler::{is_csv, FileReport, IngestHandler, IngestOutcome};
pub use journal::{IngestJournal, JournalEntry};
pub use router::{OutcomeRouter, RouteTarget};
pub use stats::{format_size, IngestStats};
pub use writer::{ArtifactRef, ArtifactWriter};
