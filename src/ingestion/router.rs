//! Outcome Router - relocates processed source files
//!
//! Files are moved with a single `rename`, never copied and deleted, so a
//! crash cannot leave the same file in two places. A rename across devices
//! fails with a route error instead of falling back to a copy.

use crate::config::{IngestConfig, SuccessPolicy};
use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where a source file ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "path", rename_all = "snake_case")]
pub enum RouteTarget {
    Moved(PathBuf),
    Deleted,
}

#[derive(Debug, Clone)]
pub struct OutcomeRouter {
    success_dir: PathBuf,
    failed_dir: PathBuf,
    success_policy: SuccessPolicy,
}

impl OutcomeRouter {
    pub fn new(success_dir: PathBuf, failed_dir: PathBuf, success_policy: SuccessPolicy) -> Self {
        Self {
            success_dir,
            failed_dir,
            success_policy,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            config.success_dir.clone(),
            config.failed_dir.clone(),
            config.on_success,
        )
    }

    /// Relocate a converted source file according to the success policy.
    pub fn route_success(&self, source: &Path) -> Result<RouteTarget> {
        match self.success_policy {
            SuccessPolicy::Move => move_into(source, &self.success_dir, "success").map(RouteTarget::Moved),
            SuccessPolicy::Delete => {
                fs::remove_file(source).map_err(|e| {
                    IngestError::Route(format!("Failed to delete {:?}: {}", source, e))
                })?;
                Ok(RouteTarget::Deleted)
            }
        }
    }

    /// Move a rejected source file into the failure holding area.
    pub fn route_failure(&self, source: &Path) -> Result<RouteTarget> {
        move_into(source, &self.failed_dir, "failed").map(RouteTarget::Moved)
    }
}

/// `dir/<stem>_<tag>.<ext>`
pub fn tagged_name(source: &Path, dir: &Path, tag: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match source.extension() {
        Some(ext) => format!("{}_{}.{}", stem, tag, ext.to_string_lossy()),
        None => format!("{}_{}", stem, tag),
    };
    dir.join(name)
}

/// Move `source` into `dir` under its tagged name, creating `dir` if needed.
pub fn move_into(source: &Path, dir: &Path, tag: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|e| IngestError::Route(format!("Failed to create directory {:?}: {}", dir, e)))?;

    let target = tagged_name(source, dir, tag);
    if target.exists() {
        return Err(IngestError::Route(format!(
            "Cannot move {:?}: {:?} already exists",
            source, target
        )));
    }

    fs::rename(source, &target)
        .map_err(|e| IngestError::Route(format!("Failed to move {:?} to {:?}: {}", source, target, e)))?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, OutcomeRouter) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input");
        fs::create_dir_all(&input).unwrap();
        let source = input.join("students.csv");
        fs::write(&source, "name;age\n").unwrap();
        let router = OutcomeRouter::new(
            dir.path().join("ok"),
            dir.path().join("failed"),
            SuccessPolicy::Move,
        );
        (dir, source, router)
    }

    #[test]
    fn test_tagged_name() {
        assert_eq!(
            tagged_name(Path::new("in/a.csv"), Path::new("out"), "failed"),
            PathBuf::from("out/a_failed.csv")
        );
        assert_eq!(
            tagged_name(Path::new("in/README"), Path::new("out"), "failed"),
            PathBuf::from("out/README_failed")
        );
    }

    #[test]
    fn test_route_success_moves_and_creates_dir() {
        let (dir, source, router) = setup();
        let target = router.route_success(&source).unwrap();
        assert_eq!(target, RouteTarget::Moved(dir.path().join("ok/students_success.csv")));
        assert!(!source.exists());
        assert!(dir.path().join("ok/students_success.csv").exists());
    }

    #[test]
    fn test_route_failure_moves() {
        let (dir, source, router) = setup();
        router.route_failure(&source).unwrap();
        assert!(!source.exists());
        assert!(dir.path().join("failed/students_failed.csv").exists());
    }

    #[test]
    fn test_delete_policy_removes_source() {
        let (dir, source, _) = setup();
        let router = OutcomeRouter::new(dir.path().join("ok"), dir.path().join("failed"), SuccessPolicy::Delete);
        assert_eq!(router.route_success(&source).unwrap(), RouteTarget::Deleted);
        assert!(!source.exists());
        assert!(!dir.path().join("ok").exists());
    }

    #[test]
    fn test_collision_is_route_error_and_source_stays() {
        let (dir, source, router) = setup();
        fs::create_dir_all(dir.path().join("failed")).unwrap();
        fs::write(dir.path().join("failed/students_failed.csv"), "older").unwrap();

        let err = router.route_failure(&source).unwrap_err();
        assert_eq!(err.kind(), "route");
        assert!(source.exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("failed/students_failed.csv")).unwrap(),
            "older"
        );
    }

    #[test]
    fn test_missing_source_is_route_error() {
        let (dir, _, router) = setup();
        assert!(router.route_failure(&dir.path().join("input/ghost.csv")).is_err());
    }
}
