#![allow(dead_code)]

use dropwatch::config::IngestConfig;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SCHEMA: &str = "name: string\nage: int\n";

/// Scratch drop-folder layout with a two-column schema.
pub struct Workspace {
    pub root: TempDir,
    pub config: IngestConfig,
}

impl Workspace {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let base = root.path();

        let schema_file = base.join("schema.yaml");
        fs::write(&schema_file, SCHEMA).unwrap();

        let config = IngestConfig {
            input_dir: base.join("input_csv"),
            output_dir: base.join("output_parquet_success"),
            success_dir: base.join("output_parquet_success").join("output_csv_success"),
            failed_dir: base.join("output_failed"),
            schema_file,
            ..IngestConfig::default()
        };
        fs::create_dir_all(&config.input_dir).unwrap();

        Self { root, config }
    }

    /// Put a file straight into the input directory.
    pub fn drop_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.config.input_dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn artifact(&self, stem: &str) -> PathBuf {
        self.config.output_dir.join(format!("{}.parquet", stem))
    }

    pub fn succeeded(&self, name: &str) -> PathBuf {
        self.config.success_dir.join(name)
    }

    pub fn failed(&self, name: &str) -> PathBuf {
        self.config.failed_dir.join(name)
    }

    pub fn input_is_empty(&self) -> bool {
        fs::read_dir(&self.config.input_dir).unwrap().next().is_none()
    }
}

pub fn read_parquet(path: &Path) -> DataFrame {
    ParquetReader::new(fs::File::open(path).unwrap()).finish().unwrap()
}

pub fn ids(df: &DataFrame) -> Vec<u64> {
    df.column("id")
        .unwrap()
        .u64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}
