//! Record batches - normalized text tables built from one dropped file

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CREATING_TIMESTAMP_COLUMN: &str = "creating_timestamp";
pub const ID_COLUMN: &str = "id";

/// Columns appended to every batch after validation.
pub const AUDIT_COLUMNS: [&str; 2] = [CREATING_TIMESTAMP_COLUMN, ID_COLUMN];

/// One named column of lower-cased cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextColumn {
    pub name: String,
    pub values: Vec<String>,
}

/// Audit values stamped onto a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditColumns {
    /// Wall clock at conversion, shared by every row of the batch
    pub created_at: DateTime<Utc>,
    /// Id of the first row; following rows count up from here
    pub first_id: u64,
}

impl AuditColumns {
    pub fn new(created_at: DateTime<Utc>, first_id: u64) -> Self {
        Self { created_at, first_id }
    }
}

/// In-memory table derived from one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBatch {
    columns: Vec<TextColumn>,
    rows: usize,
    dropped_rows: usize,
    audit: Option<AuditColumns>,
}

impl RecordBatch {
    /// Build a batch from row-major data. Every row must have one cell per column.
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<String>>, dropped_rows: usize) -> Self {
        let mut columns: Vec<TextColumn> = names
            .into_iter()
            .map(|name| TextColumn {
                name,
                values: Vec::with_capacity(rows.len()),
            })
            .collect();

        let row_count = rows.len();
        for row in rows {
            debug_assert_eq!(row.len(), columns.len());
            for (column, cell) in columns.iter_mut().zip(row) {
                column.values.push(cell);
            }
        }

        Self {
            columns,
            rows: row_count,
            dropped_rows,
            audit: None,
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn columns(&self) -> &[TextColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&TextColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Rows discarded during parsing because a field was missing.
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn audit(&self) -> Option<&AuditColumns> {
        self.audit.as_ref()
    }

    /// Stamp the audit columns. A second call replaces the first stamp.
    pub fn append_audit(&mut self, audit: AuditColumns) {
        self.audit = Some(audit);
    }
}

/// Monotonic row-id source owned by one handler.
///
/// Starts at 0 and advances by the row count of every committed batch, so ids
/// never repeat within the lifetime of the handler.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RowIdCounter {
    next: u64,
}

impl RowIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id to hand out.
    pub fn peek(&self) -> u64 {
        self.next
    }

    pub fn advance(&mut self, rows: usize) {
        self.next += rows as u64;
    }
}
