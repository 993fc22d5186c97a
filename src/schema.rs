//! Schema Store
//!
//! Ordered column declarations loaded once from a YAML mapping such as
//!
//! ```yaml
//! name: string
//! age: int
//! ```
//!
//! Only the column names take part in validation; the type tags are kept as
//! declarative metadata.

use crate::error::{IngestError, Result};
use crate::ingestion::batch::AUDIT_COLUMNS;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub type_tag: String,
}

/// Immutable, non-empty list of expected columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    columns: Vec<SchemaColumn>,
}

impl SchemaDescriptor {
    /// Load the schema from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read schema file {}: {}", path.display(), e))
        })?;

        Self::from_yaml_str(&content)
            .map_err(|e| IngestError::Config(format!("Invalid schema file {}: {}", path.display(), e)))
    }

    /// Parse a schema from YAML text.
    pub fn from_yaml_str(content: &str) -> std::result::Result<Self, String> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Err("schema is empty".to_string()),
            _ => return Err("schema must be a mapping of column name to type".to_string()),
        };

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(mapping.len());
        for (key, descriptor) in mapping {
            let raw = scalar_text(&key)
                .ok_or_else(|| format!("column names must be scalars, got {:?}", key))?;
            let name = raw.trim().to_lowercase();

            if name.is_empty() {
                return Err("column names must not be empty".to_string());
            }
            if AUDIT_COLUMNS.contains(&name.as_str()) {
                return Err(format!("'{}' is reserved for the audit columns", name));
            }
            if !seen.insert(name.clone()) {
                return Err(format!("column '{}' is declared more than once", name));
            }

            columns.push(SchemaColumn {
                name,
                type_tag: type_tag_text(&descriptor),
            });
        }

        Self::new(columns)
    }

    pub fn new(columns: Vec<SchemaColumn>) -> std::result::Result<Self, String> {
        if columns.is_empty() {
            return Err("schema declares no columns".to_string());
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    /// Column names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn type_of(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.type_tag.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn type_tag_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => scalar_text(other).unwrap_or_else(|| {
            serde_yaml::to_string(other)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_keeps_declaration_order() {
        let schema = SchemaDescriptor::from_yaml_str("Name: string\nage: int\nscore: 3\n").unwrap();
        let keys: Vec<&str> = schema.keys().collect();
        assert_eq!(keys, vec!["name", "age", "score"]);
        assert_eq!(schema.type_of("age"), Some("int"));
        assert_eq!(schema.type_of("score"), Some("3"));
    }

    #[test]
    fn test_nested_descriptor_is_rendered() {
        let schema = SchemaDescriptor::from_yaml_str("name:\n  type: varchar(20)\n").unwrap();
        assert_eq!(schema.type_of("name"), Some("type: varchar(20)"));
    }

    #[test]
    fn test_rejects_non_mapping_and_empty() {
        assert!(SchemaDescriptor::from_yaml_str("- name\n- age\n").is_err());
        assert!(SchemaDescriptor::from_yaml_str("").is_err());
        assert!(SchemaDescriptor::from_yaml_str("{}").is_err());
    }

    #[test]
    fn test_rejects_duplicates_and_audit_names() {
        assert!(SchemaDescriptor::from_yaml_str("Name: string\nname: string\n").is_err());
        assert!(SchemaDescriptor::from_yaml_str("id: int\n").is_err());
        assert!(SchemaDescriptor::from_yaml_str("creating_timestamp: datetime\n").is_err());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = SchemaDescriptor::load("/definitely/not/here/schema.yaml").unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name: string\nage: int").unwrap();
        let schema = SchemaDescriptor::load(file.path()).unwrap();
        assert_eq!(schema.len(), 2);
    }
}
