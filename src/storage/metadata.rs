//! Reading and writing run sidecars (`metadata.json`).

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::{METADATA_SCHEMA_VERSION, RunMetadata};
use crate::{ReportError, ReportResult};

use super::atomic::write_atomic;
use super::layout::{METADATA_FILE, StoreLayout};

/// A sidecar found on disk together with the directory holding it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRun {
    pub dir: PathBuf,
    pub metadata: RunMetadata,
}

/// Write a sidecar as pretty-printed JSON, creating parent directories.
pub fn write_metadata(path: &Path, metadata: &RunMetadata) -> ReportResult<()> {
    let mut json = serde_json::to_string_pretty(metadata)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}

/// Read one sidecar.
///
/// # Errors
/// Fails when the file cannot be read, is not valid JSON, or carries a
/// schema version other than `METADATA_SCHEMA_VERSION`.
pub fn read_metadata(path: &Path) -> ReportResult<RunMetadata> {
    let content = fs::read_to_string(path)
        .map_err(|e| ReportError::io(format!("failed to read {}", path.display()), e))?;
    let metadata: RunMetadata = serde_json::from_str(&content)?;
    if metadata.schema_version != METADATA_SCHEMA_VERSION {
        return Err(ReportError::Message(format!(
            "schema version mismatch in {}: found v{}, expected v{}",
            path.display(),
            metadata.schema_version,
            METADATA_SCHEMA_VERSION
        )));
    }
    Ok(metadata)
}

fn sorted_subdirs(dir: &Path) -> ReportResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Load every run sidecar under `reports/<branch>/<run>/`.
///
/// A missing `reports/` directory yields an empty list. Sidecars that are
/// unreadable or invalid are skipped with a warning so one damaged run never
/// blocks index regeneration. Results are in directory order; callers apply
/// their own ordering.
pub fn load_all(layout: &StoreLayout) -> ReportResult<Vec<StoredRun>> {
    let reports_dir = layout.reports_dir();
    if !reports_dir.is_dir() {
        tracing::debug!(path = %reports_dir.display(), "no reports directory yet");
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for branch_dir in sorted_subdirs(&reports_dir)? {
        for run_dir in sorted_subdirs(&branch_dir)? {
            let path = run_dir.join(METADATA_FILE);
            if !path.is_file() {
                tracing::debug!(path = %run_dir.display(), "run directory without sidecar");
                continue;
            }
            match read_metadata(&path) {
                Ok(metadata) => runs.push(StoredRun {
                    dir: run_dir,
                    metadata,
                }),
                Err(e) => tracing::warn!(path = %path.display(), "skipping invalid sidecar: {e}"),
            }
        }
    }
    Ok(runs)
}

/// Count files below `dir`, recursively. Symlinks count as entries and are
/// not followed.
pub fn count_files(dir: &Path) -> ReportResult<usize> {
    let mut count = 0;
    for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
        if !entry?.file_type().is_dir() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RunRecord, RunStatus};
    use tempfile::TempDir;

    fn metadata(branch: &str, run_id: &str) -> RunMetadata {
        RunMetadata::new(RunRecord {
            run_id: run_id.to_string(),
            branch: branch.to_string(),
            commit_sha: "abc1234".to_string(),
            timestamp: "2024-01-15T12:00:00Z".to_string(),
            report_path: StoreLayout::run_report_path(branch, run_id),
            status: RunStatus::Success,
        })
    }

    #[test]
    fn test_write_then_load_all() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        for (branch, run) in [("main", "2"), ("main", "1"), ("feature/x", "9")] {
            write_metadata(&layout.run_metadata(branch, run), &metadata(branch, run)).unwrap();
        }

        let runs = load_all(&layout).unwrap();
        let ids: Vec<(&str, &str)> = runs
            .iter()
            .map(|r| (r.metadata.record.branch.as_str(), r.metadata.record.run_id.as_str()))
            .collect();
        assert_eq!(ids, vec![("feature/x", "9"), ("main", "1"), ("main", "2")]);
        assert_eq!(runs[1].dir, layout.run_dir("main", "1"));
    }

    #[test]
    fn test_missing_reports_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_all(&StoreLayout::new(dir.path())).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_sidecars_are_skipped() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        write_metadata(&layout.run_metadata("main", "1"), &metadata("main", "1")).unwrap();

        let broken = layout.run_dir("main", "2");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(METADATA_FILE), "{ not json").unwrap();

        let mut future = metadata("main", "3");
        future.schema_version = 99;
        write_metadata(&layout.run_metadata("main", "3"), &future).unwrap();

        fs::create_dir_all(layout.run_dir("main", "4")).unwrap();

        let runs = load_all(&layout).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].metadata.record.run_id, "1");
    }

    #[test]
    fn test_sidecar_is_pretty_camel_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.json");
        write_metadata(&path, &metadata("main", "1")).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"schemaVersion\": 1"));
        assert!(text.contains("\"reportPath\": \"reports/main/1\""));
        assert_eq!(read_metadata(&path).unwrap(), metadata("main", "1"));
    }

    #[test]
    fn test_count_files_recursive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("x"), "").unwrap();
        fs::write(dir.path().join("a/y"), "").unwrap();
        fs::write(dir.path().join("a/b/z"), "").unwrap();
        assert_eq!(count_files(dir.path()).unwrap(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_count_files_does_not_follow_symlinks() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/y"), "").unwrap();
        std::os::unix::fs::symlink("..", dir.path().join("a/loop")).unwrap();
        // the link itself is one entry
        assert_eq!(count_files(dir.path()).unwrap(), 2);
    }
}
