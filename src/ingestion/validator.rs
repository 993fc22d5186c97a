//! Validator - exact column-set comparison against the schema

use crate::error::{IngestError, Result};
use crate::ingestion::batch::RecordBatch;
use crate::schema::SchemaDescriptor;
use std::collections::BTreeSet;

/// True when the batch columns are exactly the schema keys, in any order.
pub fn validate(batch: &RecordBatch, schema: &SchemaDescriptor) -> bool {
    let (missing, extra) = column_diff(batch, schema);
    missing.is_empty() && extra.is_empty()
}

/// Like [`validate`], but reports which columns differ.
pub fn check(batch: &RecordBatch, schema: &SchemaDescriptor) -> Result<()> {
    let (missing, extra) = column_diff(batch, schema);
    if missing.is_empty() && extra.is_empty() {
        Ok(())
    } else {
        Err(IngestError::SchemaMismatch { missing, extra })
    }
}

/// (schema columns absent from the batch, batch columns absent from the schema), both sorted.
pub fn column_diff(batch: &RecordBatch, schema: &SchemaDescriptor) -> (Vec<String>, Vec<String>) {
    let expected: BTreeSet<&str> = schema.keys().collect();
    let actual: BTreeSet<&str> = batch.column_names().collect();

    let missing = expected.difference(&actual).map(|s| s.to_string()).collect();
    let extra = actual.difference(&expected).map(|s| s.to_string()).collect();
    (missing, extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::converter::Converter;

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::from_yaml_str("name: string\nage: int\n").unwrap()
    }

    fn batch(csv: &str) -> RecordBatch {
        Converter::with_delimiter(b';').convert(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_exact_set_in_any_order_passes() {
        assert!(validate(&batch("Age;Name\n30;Alice\n"), &schema()));
        assert!(check(&batch("Name;Age\n"), &schema()).is_ok());
    }

    #[test]
    fn test_extra_column_fails() {
        let b = batch("Name;Age;Email\nAlice;30;a@x.io\n");
        assert!(!validate(&b, &schema()));
        match check(&b, &schema()) {
            Err(IngestError::SchemaMismatch { missing, extra }) => {
                assert!(missing.is_empty());
                assert_eq!(extra, vec!["email"]);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_fails() {
        let b = batch("Name\nAlice\n");
        assert!(!validate(&b, &schema()));
        let (missing, extra) = column_diff(&b, &schema());
        assert_eq!(missing, vec!["age"]);
        assert!(extra.is_empty());
    }
}
