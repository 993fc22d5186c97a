//! Converter - parses delimited text into a normalized RecordBatch

use crate::config::{IngestConfig, DEFAULT_NULL_VALUES};
use crate::error::{IngestError, Result};
use crate::ingestion::batch::RecordBatch;
use csv::ReaderBuilder;
use std::collections::HashSet;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Delimited-text converter.
///
/// Normalization: rows with any missing field are dropped, headers are trimmed,
/// lower-cased and stripped of delimiter characters, and every cell is
/// lower-cased. Cell text is otherwise kept as written.
#[derive(Debug, Clone)]
pub struct Converter {
    delimiter: u8,
    null_values: HashSet<String>,
}

impl Converter {
    pub fn new(delimiter: u8, null_values: impl IntoIterator<Item = String>) -> Self {
        Self {
            delimiter,
            null_values: null_values.into_iter().collect(),
        }
    }

    /// Converter with the default null tokens.
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self::new(delimiter, DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()))
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.delimiter_byte(), config.null_values.iter().cloned())
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Parse and normalize raw file contents.
    pub fn convert(&self, raw: &[u8]) -> Result<RecordBatch> {
        let raw = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(raw);

        let headers = rdr
            .headers()
            .map_err(|e| IngestError::Parse(format!("Failed to read CSV headers: {}", e)))?
            .clone();

        if headers.is_empty() {
            return Err(IngestError::Parse("File has no header row".to_string()));
        }

        let names = self.normalize_headers(headers.iter())?;

        let mut rows = Vec::new();
        let mut dropped = 0usize;
        for result in rdr.records() {
            let record =
                result.map_err(|e| IngestError::Parse(format!("Failed to read CSV record: {}", e)))?;

            if record.len() > names.len() {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                return Err(IngestError::Parse(format!(
                    "Line {}: expected {} fields, found {}",
                    line,
                    names.len(),
                    record.len()
                )));
            }

            if record.len() < names.len() || record.iter().any(|cell| self.is_missing(cell)) {
                dropped += 1;
                continue;
            }

            rows.push(record.iter().map(|cell| cell.to_lowercase()).collect());
        }

        Ok(RecordBatch::from_rows(names, rows, dropped))
    }

    fn normalize_headers<'a>(&self, raw: impl Iterator<Item = &'a str>) -> Result<Vec<String>> {
        let delimiter = self.delimiter as char;
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for (idx, header) in raw.enumerate() {
            let name = header.replace(delimiter, "").trim().to_lowercase();
            if name.is_empty() {
                return Err(IngestError::Parse(format!("Column {} has an empty name", idx + 1)));
            }
            if !seen.insert(name.clone()) {
                return Err(IngestError::Parse(format!("Duplicate column '{}'", name)));
            }
            names.push(name);
        }

        Ok(names)
    }

    fn is_missing(&self, cell: &str) -> bool {
        cell.is_empty() || self.null_values.contains(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> Converter {
        Converter::with_delimiter(b';')
    }

    #[test]
    fn test_normalizes_headers_and_cells() {
        let batch = converter()
            .convert(b" Name ;AGE;City\nAlice;30;PARIS\nBob;41;Oslo\n")
            .unwrap();

        assert_eq!(batch.column_names().collect::<Vec<_>>(), vec!["name", "age", "city"]);
        assert_eq!(batch.column("name").unwrap().values, vec!["alice", "bob"]);
        assert_eq!(batch.column("city").unwrap().values, vec!["paris", "oslo"]);
        assert_eq!(batch.row_count(), 2);
    }

    #[test]
    fn test_drops_rows_with_missing_fields() {
        let batch = converter()
            .convert(b"Name;Age\nAlice;30\nBob;\nCarol\nDave;NaN\nEve;null\n")
            .unwrap();

        assert_eq!(batch.row_count(), 1);
        assert_eq!(batch.dropped_rows(), 4);
        assert_eq!(batch.column("age").unwrap().values, vec!["30"]);
    }

    #[test]
    fn test_whitespace_cell_is_not_missing() {
        let batch = converter().convert(b"a;b\nx; \n").unwrap();
        assert_eq!(batch.row_count(), 1);
        assert_eq!(batch.column("b").unwrap().values, vec![" "]);
    }

    #[test]
    fn test_custom_null_tokens() {
        let converter = Converter::new(b';', vec!["".to_string(), "-".to_string()]);
        let batch = converter.convert(b"a;b\nx;-\ny;NA\n").unwrap();
        assert_eq!(batch.column("b").unwrap().values, vec!["na"]);
    }

    #[test]
    fn test_strips_bom_and_quoted_delimiter_in_header() {
        let batch = converter().convert(b"\xEF\xBB\xBFName;\"Full;Age\"\nA;1\n").unwrap();
        assert_eq!(batch.column_names().collect::<Vec<_>>(), vec!["name", "fullage"]);
    }

    #[test]
    fn test_comma_is_plain_text_with_semicolon_delimiter() {
        let batch = converter().convert(b"name,age\nalice,30\n").unwrap();
        assert_eq!(batch.column_names().collect::<Vec<_>>(), vec!["name,age"]);
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(converter().convert(b""), Err(IngestError::Parse(_))));
        assert!(matches!(
            converter().convert(b"a;b\n1;2;3\n"),
            Err(IngestError::Parse(_))
        ));
        assert!(matches!(
            converter().convert(b"a;A\n1;2\n"),
            Err(IngestError::Parse(_))
        ));
        assert!(matches!(
            converter().convert(b"a;;b\n1;2;3\n"),
            Err(IngestError::Parse(_))
        ));
        assert!(matches!(
            converter().convert(b"a;b\n\xFF\xFE;2\n"),
            Err(IngestError::Parse(_))
        ));
    }

    #[test]
    fn test_numbers_keep_their_text() {
        let batch = converter().convert(b"x\n3.50\n1E3\n").unwrap();
        assert_eq!(batch.column("x").unwrap().values, vec!["3.50", "1e3"]);
    }
}
