pub mod config;
pub mod error;
pub mod ingestion;
pub mod schema;
pub mod telemetry;
pub mod watch;

pub use config::{IngestConfig, SuccessPolicy};
pub use error::{IngestError, Result};
pub use ingestion::{FileReport, IngestHandler, IngestOutcome};
pub use schema::SchemaDescriptor;
pub use watch::{LoopState, LoopSummary, WatchEvent, WatchLoop};
