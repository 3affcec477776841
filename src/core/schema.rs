//! Run records and the metadata sidecar schema.
//!
//! The sidecar (`metadata.json`) is the only machine-readable contract between
//! publishing and index regeneration; index pages are never re-parsed.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::stats::TestStats;
use crate::formats::ReportFormat;

/// Schema version for RunMetadata
pub const METADATA_SCHEMA_VERSION: u32 = 1;

/// Outcome of a published run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
    /// No reports were available when the run was published
    Pending,
}

impl RunStatus {
    /// Derive a run status from its aggregated stats.
    pub fn from_stats(stats: &TestStats) -> RunStatus {
        if stats.failed > 0 {
            RunStatus::Failure
        } else {
            RunStatus::Success
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
            RunStatus::Pending => "pending",
        }
    }
}

/// One CI run, identified by `(branch, run_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub branch: String,
    pub commit_sha: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
    /// Run directory relative to the store root (e.g. "reports/main/42")
    pub report_path: String,
    pub status: RunStatus,
}

impl RunRecord {
    pub fn parsed_timestamp(&self) -> Option<OffsetDateTime> {
        parse_timestamp(&self.timestamp)
    }

    /// First seven characters of the commit SHA.
    pub fn short_sha(&self) -> &str {
        match self.commit_sha.char_indices().nth(7) {
            Some((idx, _)) => &self.commit_sha[..idx],
            None => &self.commit_sha,
        }
    }
}

/// Parse an RFC 3339 timestamp; malformed or empty values yield `None`.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).ok()
}

/// Canonical run ordering: newest first, then `run_id` descending.
///
/// Records whose timestamp is missing or unparseable sort after every
/// parseable one, i.e. they are treated as oldest.
pub fn compare_newest_first(a: &RunRecord, b: &RunRecord) -> Ordering {
    let (ta, tb) = (a.parsed_timestamp(), b.parsed_timestamp());
    tb.cmp(&ta).then_with(|| b.run_id.cmp(&a.run_id))
}

/// Sort records with the canonical ordering.
pub fn sort_newest_first(records: &mut [RunRecord]) {
    records.sort_by(compare_newest_first);
}

/// One converted artifact inside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub format: ReportFormat,
    /// Page file name inside the run directory (e.g. "junit.html")
    pub file: String,
    /// Source artifact path relative to the reports source directory
    pub source: String,
    pub package: String,
    pub source_sha256: String,
    pub stats: TestStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

/// Sidecar written next to every run's pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub schema_version: u32,
    #[serde(flatten)]
    pub record: RunRecord,
    /// Distinct formats converted for this run, in priority order
    pub formats: Vec<ReportFormat>,
    /// Aggregated stats across every converted report
    pub stats: TestStats,
    #[serde(default)]
    pub reports: Vec<ReportEntry>,
    /// Source files that matched no known format
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unrecognized: Vec<String>,
}

impl RunMetadata {
    pub fn new(record: RunRecord) -> Self {
        RunMetadata {
            schema_version: METADATA_SCHEMA_VERSION,
            record,
            formats: Vec::new(),
            stats: TestStats::default(),
            reports: Vec::new(),
            unrecognized: Vec::new(),
        }
    }
}

/// Sort sidecars with the canonical ordering of their records.
pub fn sort_metadata_newest_first(runs: &mut [RunMetadata]) {
    runs.sort_by(|a, b| compare_newest_first(&a.record, &b.record));
}
