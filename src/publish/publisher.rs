//! Publishing one run into the report store.
//!
//! ```text
//! Start -> CheckArtifacts -> WriteFallback --------------+
//!                         \-> WriteReports --------------+-> ApplyRetention -> RegenerateIndex -> Done
//! any stage -> Failed
//! ```
//!
//! Filesystem failures never panic or propagate out of [`Publisher::publish`];
//! they end in `Failed` and are reported through [`PublishOutcome`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::collect::{Artifact, CollectOptions, Collector};
use crate::core::{Coverage, ReportEntry, RunMetadata, RunRecord, RunStatus, TestStats};
use crate::formats::{ReportFormat, RenderContext};
use crate::history::{
    DEFAULT_MAX_RECENT_RUNS, DEFAULT_MAX_REPORTS_PER_BRANCH, DEFAULT_MAX_RUNS_PER_BRANCH,
    IndexGenerator, IndexOptions, RetentionPolicy,
};
use crate::storage::{
    INDEX_FILE, METADATA_FILE, StoreLayout, count_files, load_all, sanitize_segment,
    write_atomic, write_metadata,
};
use crate::{ReportError, ReportResult, now_string};

use super::run_page::{render_fallback_page, render_run_page};

/// File name of istanbul summaries passed through as coverage.
const COVERAGE_SUMMARY_FILE: &str = "coverage-summary.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Start,
    CheckArtifacts,
    WriteFallback,
    WriteReports,
    ApplyRetention,
    RegenerateIndex,
    Done,
    Failed,
}

impl PublishStage {
    pub fn label(&self) -> &'static str {
        match self {
            PublishStage::Start => "start",
            PublishStage::CheckArtifacts => "check_artifacts",
            PublishStage::WriteFallback => "write_fallback",
            PublishStage::WriteReports => "write_reports",
            PublishStage::ApplyRetention => "apply_retention",
            PublishStage::RegenerateIndex => "regenerate_index",
            PublishStage::Done => "done",
            PublishStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub branch: String,
    pub run_id: String,
    pub commit_sha: String,
    /// RFC 3339
    pub timestamp: String,
    /// Directory holding the raw artifacts of this run
    pub reports_source_path: PathBuf,
    pub max_reports_per_branch: usize,
    pub max_recent_runs: usize,
    pub max_runs_per_branch: usize,
    pub fail_on_error: bool,
    /// Stamp for generated pages; the current time when unset
    pub generated_at: Option<String>,
}

impl PublishRequest {
    pub fn new(
        branch: impl Into<String>,
        run_id: impl Into<String>,
        commit_sha: impl Into<String>,
        timestamp: impl Into<String>,
        reports_source_path: impl AsRef<Path>,
    ) -> Self {
        PublishRequest {
            branch: branch.into(),
            run_id: run_id.into(),
            commit_sha: commit_sha.into(),
            timestamp: timestamp.into(),
            reports_source_path: reports_source_path.as_ref().to_path_buf(),
            max_reports_per_branch: DEFAULT_MAX_REPORTS_PER_BRANCH,
            max_recent_runs: DEFAULT_MAX_RECENT_RUNS,
            max_runs_per_branch: DEFAULT_MAX_RUNS_PER_BRANCH,
            fail_on_error: false,
            generated_at: None,
        }
    }

    fn index_options(&self, generated_at: &str) -> IndexOptions {
        IndexOptions {
            max_recent_runs: self.max_recent_runs,
            max_runs_per_branch: self.max_runs_per_branch,
            generated_at: generated_at.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    pub success: bool,
    /// Run directory relative to the store root
    pub report_path: String,
    pub files_published: usize,
    pub files_deleted: usize,
    pub error: Option<String>,
    pub failed_stage: Option<PublishStage>,
    /// Every stage entered, in order
    pub stage_trace: Vec<PublishStage>,
    pub status: Option<RunStatus>,
    pub stats: TestStats,
}

impl PublishOutcome {
    /// Turn a failed outcome into an error when the caller opted in.
    pub fn into_result(self, fail_on_error: bool) -> ReportResult<PublishOutcome> {
        if self.success || !fail_on_error {
            return Ok(self);
        }
        let stage = self.failed_stage.unwrap_or(PublishStage::Failed);
        Err(ReportError::Message(format!(
            "publish failed during {stage}: {}",
            self.error.as_deref().unwrap_or("unknown error")
        )))
    }
}

/// Files touched while rebuilding the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexWrite {
    pub files_written: usize,
    pub files_deleted: usize,
    pub runs_indexed: usize,
}

struct PublishState {
    trace: Vec<PublishStage>,
    files_published: usize,
    files_deleted: usize,
    status: Option<RunStatus>,
    stats: TestStats,
}

impl PublishState {
    fn enter(&mut self, stage: PublishStage) {
        tracing::debug!(stage = stage.label(), "entering stage");
        self.trace.push(stage);
    }

    fn current(&self) -> PublishStage {
        self.trace.last().copied().unwrap_or(PublishStage::Start)
    }
}

#[derive(Debug, Clone)]
pub struct Publisher {
    layout: StoreLayout,
}

impl Publisher {
    pub fn new(store_root: impl AsRef<Path>) -> Self {
        Publisher {
            layout: StoreLayout::new(store_root),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Publish one run. Never fails; see [`PublishOutcome::into_result`].
    pub fn publish(&self, request: &PublishRequest) -> PublishOutcome {
        let span = tracing::info_span!("publish", branch = %request.branch, run_id = %request.run_id);
        let _guard = span.enter();

        let mut state = PublishState {
            trace: Vec::new(),
            files_published: 0,
            files_deleted: 0,
            status: None,
            stats: TestStats::default(),
        };
        let report_path = StoreLayout::run_report_path(&request.branch, &request.run_id);

        match self.run_stages(request, &mut state) {
            Ok(()) => {
                state.enter(PublishStage::Done);
                tracing::info!(
                    report_path = %report_path,
                    published = state.files_published,
                    deleted = state.files_deleted,
                    "publish complete"
                );
                PublishOutcome {
                    success: true,
                    report_path,
                    files_published: state.files_published,
                    files_deleted: state.files_deleted,
                    error: None,
                    failed_stage: None,
                    stage_trace: state.trace,
                    status: state.status,
                    stats: state.stats,
                }
            }
            Err(e) => {
                let failed_stage = state.current();
                state.enter(PublishStage::Failed);
                tracing::warn!(stage = failed_stage.label(), "publish failed: {e}");
                PublishOutcome {
                    success: false,
                    report_path,
                    files_published: state.files_published,
                    files_deleted: state.files_deleted,
                    error: Some(e.to_string()),
                    failed_stage: Some(failed_stage),
                    stage_trace: state.trace,
                    status: state.status,
                    stats: state.stats,
                }
            }
        }
    }

    fn run_stages(&self, request: &PublishRequest, state: &mut PublishState) -> ReportResult<()> {
        state.enter(PublishStage::Start);
        if request.branch.trim().is_empty() || request.run_id.trim().is_empty() {
            return Err(ReportError::Message(
                "branch and run id must not be empty".to_string(),
            ));
        }
        let policy = RetentionPolicy::from_count(request.max_reports_per_branch).ok_or_else(|| {
            ReportError::Message("max reports per branch must be at least 1".to_string())
        })?;
        if crate::core::parse_timestamp(&request.timestamp).is_none() {
            tracing::warn!(timestamp = %request.timestamp, "timestamp is not RFC 3339; run will sort as oldest");
        }
        let generated_at = request.generated_at.clone().unwrap_or_else(now_string);

        state.enter(PublishStage::CheckArtifacts);
        let has_artifacts = has_artifacts(&request.reports_source_path)?;
        tracing::info!(
            source = %request.reports_source_path.display(),
            has_artifacts,
            "checked report source"
        );

        let metadata = if has_artifacts {
            state.enter(PublishStage::WriteReports);
            self.write_reports(request, &generated_at, state)?
        } else {
            state.enter(PublishStage::WriteFallback);
            self.write_fallback(request, &generated_at, state)?
        };
        state.status = Some(metadata.record.status);
        state.stats = metadata.stats.clone();

        state.enter(PublishStage::ApplyRetention);
        state.files_deleted += self.apply_retention(&request.branch, request, &policy)?;

        state.enter(PublishStage::RegenerateIndex);
        let written = self.regenerate_index(&request.index_options(&generated_at))?;
        state.files_published += written.files_written;
        state.files_deleted += written.files_deleted;
        Ok(())
    }

    fn record(&self, request: &PublishRequest, status: RunStatus) -> RunRecord {
        RunRecord {
            run_id: request.run_id.clone(),
            branch: request.branch.clone(),
            commit_sha: request.commit_sha.clone(),
            timestamp: request.timestamp.clone(),
            report_path: StoreLayout::run_report_path(&request.branch, &request.run_id),
            status,
        }
    }

    /// Create an empty run directory, clearing what a previous attempt left.
    fn prepare_run_dir(&self, request: &PublishRequest) -> ReportResult<PathBuf> {
        let run_dir = self.layout.run_dir(&request.branch, &request.run_id);
        if run_dir.exists() {
            tracing::info!(path = %run_dir.display(), "replacing existing run directory");
            fs::remove_dir_all(&run_dir)
                .map_err(|e| ReportError::io(format!("failed to clear {}", run_dir.display()), e))?;
        }
        fs::create_dir_all(&run_dir)
            .map_err(|e| ReportError::io(format!("failed to create {}", run_dir.display()), e))?;
        Ok(run_dir)
    }

    fn write_fallback(
        &self,
        request: &PublishRequest,
        generated_at: &str,
        state: &mut PublishState,
    ) -> ReportResult<RunMetadata> {
        let run_dir = self.prepare_run_dir(request)?;
        let metadata = RunMetadata::new(self.record(request, RunStatus::Pending));

        write_text(&run_dir.join(INDEX_FILE), &render_fallback_page(&metadata, generated_at))?;
        write_metadata(&run_dir.join(METADATA_FILE), &metadata)?;
        state.files_published += 2;
        tracing::info!(path = %run_dir.display(), "wrote fallback page");
        Ok(metadata)
    }

    fn write_reports(
        &self,
        request: &PublishRequest,
        generated_at: &str,
        state: &mut PublishState,
    ) -> ReportResult<RunMetadata> {
        let packages = Collector::new(&request.reports_source_path)
            .collect(&CollectOptions::all_files())?;
        let mut artifacts: Vec<(&str, &Artifact)> = packages
            .iter()
            .flat_map(|p| p.artifacts.iter().map(move |a| (p.package_name.as_str(), a)))
            .collect();
        artifacts.sort_by(|a, b| a.1.relative_path.cmp(&b.1.relative_path));

        let run_dir = self.prepare_run_dir(request)?;

        let mut reports = Vec::new();
        let mut unrecognized = Vec::new();
        let mut coverage_payloads = Vec::new();
        let mut per_format: HashMap<ReportFormat, usize> = HashMap::new();

        for (package, artifact) in artifacts {
            let is_coverage = artifact
                .path
                .file_name()
                .is_some_and(|n| n == COVERAGE_SUMMARY_FILE);
            if is_coverage {
                coverage_payloads.push(read_payload(&artifact.path)?);
                continue;
            }
            let Some(converter) = artifact.format.converter() else {
                tracing::debug!(path = %artifact.relative_path, "unrecognized artifact");
                unrecognized.push(artifact.relative_path.clone());
                continue;
            };

            let payload = read_payload(&artifact.path)?;
            let count = per_format.entry(artifact.format).or_insert(0);
            *count += 1;
            let file = if *count == 1 {
                format!("{}.html", artifact.format.slug())
            } else {
                format!("{}-{}.html", artifact.format.slug(), count)
            };

            let ctx = RenderContext::new(artifact.relative_path.clone(), generated_at);
            let result = converter.convert(&payload, &ctx);
            write_text(&run_dir.join(&file), &result.html)?;
            state.files_published += 1;
            tracing::info!(
                source = %artifact.relative_path,
                format = artifact.format.slug(),
                total = result.stats.total,
                failed = result.stats.failed,
                "converted report"
            );

            reports.push(ReportEntry {
                format: artifact.format,
                file,
                source: artifact.relative_path.clone(),
                package: package.to_string(),
                source_sha256: sha256::digest(payload.as_str()),
                stats: result.stats,
                parse_error: result.parse_error,
            });
        }

        let mut stats = TestStats::aggregate(reports.iter().map(|r| &r.stats));
        stats.coverage =
            Coverage::combine_istanbul_summaries(coverage_payloads.iter().map(String::as_str));

        let present: HashSet<ReportFormat> = reports.iter().map(|r| r.format).collect();
        let formats: Vec<ReportFormat> = ReportFormat::PRIORITY
            .into_iter()
            .filter(|f| present.contains(f))
            .collect();

        let status = if reports.is_empty() {
            RunStatus::Pending
        } else {
            RunStatus::from_stats(&stats)
        };
        let mut metadata = RunMetadata::new(self.record(request, status));
        metadata.formats = formats;
        metadata.stats = stats;
        metadata.reports = reports;
        metadata.unrecognized = unrecognized;

        write_text(&run_dir.join(INDEX_FILE), &render_run_page(&metadata, generated_at))?;
        write_metadata(&run_dir.join(METADATA_FILE), &metadata)?;
        state.files_published += 2;
        Ok(metadata)
    }

    /// Delete the runs of `branch` beyond the retention limit.
    ///
    /// Returns the number of files removed.
    fn apply_retention(
        &self,
        branch: &str,
        request: &PublishRequest,
        policy: &RetentionPolicy,
    ) -> ReportResult<usize> {
        let stored: Vec<_> = load_all(&self.layout)?
            .into_iter()
            .filter(|r| r.metadata.record.branch == branch)
            .collect();
        let records: Vec<RunRecord> = stored.iter().map(|r| r.metadata.record.clone()).collect();
        let plan = policy.apply(&records);

        let dirs: BTreeMap<&str, &Path> = stored
            .iter()
            .map(|r| (r.metadata.record.run_id.as_str(), r.dir.as_path()))
            .collect();

        let mut deleted = 0;
        for run in &plan.remove {
            let Some(dir) = dirs.get(run.run_id.as_str()) else {
                continue;
            };
            if run.run_id == request.run_id {
                tracing::warn!(run_id = %run.run_id, "the run just published is outside the retention window");
            }
            deleted += count_files(dir)?;
            fs::remove_dir_all(dir)
                .map_err(|e| ReportError::io(format!("failed to remove {}", dir.display()), e))?;
            tracing::info!(branch, run_id = %run.run_id, "removed run by retention");
        }
        tracing::debug!(
            branch,
            retained = plan.retain.len(),
            removed = plan.remove.len(),
            files = deleted,
            "applied retention"
        );
        Ok(deleted)
    }

    /// Rebuild every index page from the sidecars on disk.
    ///
    /// Also usable on its own to repair a store after an interrupted publish.
    /// Branch index pages whose branch no longer has runs are removed.
    pub fn regenerate_index(&self, options: &IndexOptions) -> ReportResult<IndexWrite> {
        let runs: Vec<RunMetadata> = load_all(&self.layout)?
            .into_iter()
            .map(|r| r.metadata)
            .collect();
        let documents = IndexGenerator::new(options.clone()).generate(&runs);

        let mut write = IndexWrite {
            runs_indexed: runs.len(),
            ..IndexWrite::default()
        };
        write_text(&self.layout.global_index(), &documents.global)?;
        write.files_written += 1;

        let mut live_dirs = HashSet::new();
        for (branch, html) in &documents.branches {
            write_text(&self.layout.branch_index(branch), html)?;
            live_dirs.insert(sanitize_segment(branch));
            write.files_written += 1;
        }

        write_text(&self.layout.home_page(), &documents.home_markdown)?;
        write.files_written += 1;

        write.files_deleted += self.remove_stale_branch_pages(&live_dirs)?;
        tracing::info!(
            runs = write.runs_indexed,
            branches = documents.branches.len(),
            "regenerated index"
        );
        Ok(write)
    }

    fn remove_stale_branch_pages(&self, live_dirs: &HashSet<String>) -> ReportResult<usize> {
        let reports_dir = self.layout.reports_dir();
        let entries = fs::read_dir(&reports_dir)
            .map_err(|e| ReportError::io(format!("failed to list {}", reports_dir.display()), e))?;
        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| {
                ReportError::io(format!("failed to list {}", reports_dir.display()), e)
            })?;
            let dir = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !dir.is_dir() || live_dirs.contains(&name) {
                continue;
            }
            let page = dir.join(INDEX_FILE);
            if page.is_file() {
                fs::remove_file(&page)
                    .map_err(|e| ReportError::io(format!("failed to remove {}", page.display()), e))?;
                removed += 1;
                tracing::info!(branch_dir = %name, "removed stale branch index");
            }
            let is_empty = fs::read_dir(&dir)
                .map(|mut d| d.next().is_none())
                .unwrap_or(false);
            if is_empty {
                fs::remove_dir(&dir)
                    .map_err(|e| ReportError::io(format!("failed to remove {}", dir.display()), e))?;
            }
        }
        Ok(removed)
    }
}

/// Artifacts exist iff the source is an existing, non-empty directory.
fn has_artifacts(source: &Path) -> ReportResult<bool> {
    if !source.is_dir() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(source)
        .map_err(|e| ReportError::io(format!("failed to list {}", source.display()), e))?;
    Ok(entries.next().is_some())
}

fn read_payload(path: &Path) -> ReportResult<String> {
    let bytes =
        fs::read(path).map_err(|e| ReportError::io(format!("failed to read {}", path.display()), e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_text(path: &Path, content: &str) -> ReportResult<()> {
    write_atomic(path, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_has_artifacts() {
        let dir = TempDir::new().unwrap();
        assert!(!has_artifacts(&dir.path().join("missing")).unwrap());
        assert!(!has_artifacts(dir.path()).unwrap());
        let file = dir.path().join("f.xml");
        fs::write(&file, "").unwrap();
        assert!(!has_artifacts(&file).unwrap());
        assert!(has_artifacts(dir.path()).unwrap());
    }

    #[test]
    fn test_into_result_respects_flag() {
        let outcome = PublishOutcome {
            success: false,
            report_path: "reports/main/1".to_string(),
            files_published: 0,
            files_deleted: 0,
            error: Some("disk full".to_string()),
            failed_stage: Some(PublishStage::WriteReports),
            stage_trace: vec![PublishStage::Start, PublishStage::Failed],
            status: None,
            stats: TestStats::default(),
        };
        assert!(outcome.clone().into_result(false).is_ok());
        let err = outcome.into_result(true).unwrap_err();
        assert_eq!(err.to_string(), "publish failed during write_reports: disk full");
    }

    #[test]
    fn test_zero_retention_fails_at_start() {
        let store = TempDir::new().unwrap();
        let mut request = PublishRequest::new("main", "1", "abc", "2024-01-01T00:00:00Z", "/nope");
        request.max_reports_per_branch = 0;
        let outcome = Publisher::new(store.path()).publish(&request);
        assert!(!outcome.success);
        assert_eq!(outcome.failed_stage, Some(PublishStage::Start));
        assert_eq!(
            outcome.stage_trace,
            vec![PublishStage::Start, PublishStage::Failed]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_store_fails_with_stage() {
        use std::os::unix::fs::PermissionsExt;

        let store = TempDir::new().unwrap();
        let reports = store.path().join("reports");
        fs::create_dir_all(&reports).unwrap();
        fs::set_permissions(&reports, fs::Permissions::from_mode(0o500)).unwrap();
        // root ignores permission bits
        if fs::write(reports.join("write-check"), "").is_ok() {
            return;
        }

        let request = PublishRequest::new("main", "1", "abc", "2024-01-01T00:00:00Z", "/nope");
        let outcome = Publisher::new(store.path()).publish(&request);
        fs::set_permissions(&reports, fs::Permissions::from_mode(0o700)).unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.failed_stage, Some(PublishStage::WriteFallback));
        assert!(outcome.error.as_ref().unwrap().contains("failed to create"));
        assert!(outcome.into_result(false).is_ok());
    }
}
