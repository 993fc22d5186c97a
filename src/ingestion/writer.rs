//! Artifact Writer - serializes record batches to Parquet
//!
//! Data columns are written as UTF-8 strings, `creating_timestamp` as a
//! microsecond timestamp and `id` as UInt64. The file is written next to its
//! destination under a hidden temporary name and renamed into place, so a
//! failed write never leaves a partial artifact behind.

use crate::error::{IngestError, Result};
use crate::ingestion::batch::{RecordBatch, CREATING_TIMESTAMP_COLUMN, ID_COLUMN};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub rows: usize,
}

/// Parquet artifact writer
#[derive(Debug, Clone, Default)]
pub struct ArtifactWriter;

impl ArtifactWriter {
    pub fn new() -> Self {
        Self
    }

    /// Destination for the artifact derived from `source`: `<output_dir>/<stem>.parquet`.
    pub fn artifact_path(output_dir: &Path, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        output_dir.join(format!("{}.parquet", stem))
    }

    /// Write `batch` to `destination`.
    ///
    /// Fails with [`IngestError::ArtifactExists`] if the destination is
    /// already present; the existing file is left untouched.
    pub fn serialize(&self, batch: &RecordBatch, destination: &Path) -> Result<ArtifactRef> {
        if destination.exists() {
            return Err(IngestError::ArtifactExists(destination.to_path_buf()));
        }

        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| {
            IngestError::Write(format!("Failed to create output directory {:?}: {}", parent, e))
        })?;

        let file_name = destination
            .file_name()
            .ok_or_else(|| IngestError::Write(format!("Invalid artifact path: {:?}", destination)))?
            .to_string_lossy()
            .into_owned();
        let temp_path = parent.join(format!(".{}.tmp", file_name));

        let result = self
            .write_parquet(batch, &temp_path)
            .and_then(|_| commit(&temp_path, destination));

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result?;

        let size_bytes = fs::metadata(destination)
            .map_err(|e| IngestError::Write(format!("Failed to stat {:?}: {}", destination, e)))?
            .len();

        Ok(ArtifactRef {
            path: destination.to_path_buf(),
            size_bytes,
            rows: batch.row_count(),
        })
    }

    fn write_parquet(&self, batch: &RecordBatch, path: &Path) -> Result<()> {
        let mut df = to_data_frame(batch)
            .map_err(|e| IngestError::Write(format!("Failed to build DataFrame: {}", e)))?;

        let mut file = fs::File::create(path)
            .map_err(|e| IngestError::Write(format!("Failed to create Parquet file {:?}: {}", path, e)))?;

        ParquetWriter::new(&mut file)
            .finish(&mut df)
            .map_err(|e| IngestError::Write(format!("Failed to write Parquet file {:?}: {}", path, e)))?;

        file.sync_all()
            .map_err(|e| IngestError::Write(format!("Failed to flush Parquet file {:?}: {}", path, e)))?;

        Ok(())
    }
}

fn commit(temp_path: &Path, destination: &Path) -> Result<()> {
    // Another writer may have claimed the name while we were encoding.
    if destination.exists() {
        return Err(IngestError::ArtifactExists(destination.to_path_buf()));
    }
    fs::rename(temp_path, destination).map_err(|e| {
        IngestError::Write(format!("Failed to move artifact into {:?}: {}", destination, e))
    })
}

/// Build a polars DataFrame from a batch, audit columns last.
pub fn to_data_frame(batch: &RecordBatch) -> PolarsResult<DataFrame> {
    let mut series: Vec<Series> = batch
        .columns()
        .iter()
        .map(|c| Series::new(&c.name, c.values.as_slice()))
        .collect();

    if let Some(audit) = batch.audit() {
        let rows = batch.row_count();
        let created = Series::new(
            CREATING_TIMESTAMP_COLUMN,
            vec![audit.created_at.timestamp_micros(); rows],
        )
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;

        let ids: Vec<u64> = (audit.first_id..audit.first_id + rows as u64).collect();

        series.push(created);
        series.push(Series::new(ID_COLUMN, ids));
    }

    DataFrame::new(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::batch::AuditColumns;
    use crate::ingestion::converter::Converter;
    use chrono::Utc;
    use tempfile::TempDir;

    fn stamped_batch(first_id: u64) -> RecordBatch {
        let mut batch = Converter::with_delimiter(b';')
            .convert(b"Name;Age\nAlice;30\nBob;\nCarol;41\n")
            .unwrap();
        batch.append_audit(AuditColumns::new(Utc::now(), first_id));
        batch
    }

    #[test]
    fn test_artifact_path_uses_source_stem() {
        let path = ArtifactWriter::artifact_path(Path::new("out"), Path::new("in/students.csv"));
        assert_eq!(path, PathBuf::from("out/students.parquet"));
    }

    #[test]
    fn test_data_frame_layout() {
        let df = to_data_frame(&stamped_batch(10)).unwrap();
        assert_eq!(
            df.get_column_names(),
            vec!["name", "age", CREATING_TIMESTAMP_COLUMN, ID_COLUMN]
        );
        assert_eq!(df.height(), 2);
        assert!(matches!(
            df.column(CREATING_TIMESTAMP_COLUMN).unwrap().dtype(),
            DataType::Datetime(TimeUnit::Microseconds, _)
        ));
        let ids = df.column(ID_COLUMN).unwrap().u64().unwrap();
        assert_eq!(ids.get(0), Some(10));
        assert_eq!(ids.get(1), Some(11));
    }

    #[test]
    fn test_serialize_writes_readable_parquet() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested").join("students.parquet");

        let artifact = ArtifactWriter::new().serialize(&stamped_batch(0), &dest).unwrap();
        assert_eq!(artifact.rows, 2);
        assert!(artifact.size_bytes > 0);

        let df = ParquetReader::new(fs::File::open(&dest).unwrap()).finish().unwrap();
        let names = df.column("name").unwrap().str().unwrap();
        assert_eq!(names.get(0), Some("alice"));
        assert_eq!(names.get(1), Some("carol"));

        let leftovers: Vec<_> = fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_existing_destination_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("students.parquet");
        fs::write(&dest, b"previous run").unwrap();

        let err = ArtifactWriter::new().serialize(&stamped_batch(0), &dest).unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(fs::read(&dest).unwrap(), b"previous run");
    }
}
