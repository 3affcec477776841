//! Per-branch retention of published runs.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use crate::core::{RunRecord, compare_newest_first};

/// Default number of runs kept per branch.
pub const DEFAULT_MAX_REPORTS_PER_BRANCH: usize = 20;

/// Partition of a run set into runs to keep and runs to delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionPlan {
    /// Newest first within each branch, branches in name order
    pub retain: Vec<RunRecord>,
    pub remove: Vec<RunRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    max_per_branch: NonZeroUsize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy {
            max_per_branch: NonZeroUsize::new(DEFAULT_MAX_REPORTS_PER_BRANCH)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl RetentionPolicy {
    pub fn new(max_per_branch: NonZeroUsize) -> Self {
        RetentionPolicy { max_per_branch }
    }

    /// Build a policy from a plain count; zero is rejected.
    pub fn from_count(max_per_branch: usize) -> Option<Self> {
        NonZeroUsize::new(max_per_branch).map(RetentionPolicy::new)
    }

    pub fn max_per_branch(&self) -> usize {
        self.max_per_branch.get()
    }

    /// Keep the newest `max_per_branch` runs of every branch.
    ///
    /// The input order does not matter; each branch is ordered newest first
    /// (unparseable timestamps last) before being cut. A branch with at most
    /// `max_per_branch` runs loses nothing.
    pub fn apply(&self, runs: &[RunRecord]) -> RetentionPlan {
        let mut by_branch: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();
        for run in runs {
            by_branch.entry(run.branch.as_str()).or_default().push(run);
        }

        let mut plan = RetentionPlan::default();
        let max = self.max_per_branch.get();
        for (branch, mut branch_runs) in by_branch {
            branch_runs.sort_by(|a, b| compare_newest_first(a, b));
            if branch_runs.len() > max {
                tracing::debug!(
                    branch,
                    total = branch_runs.len(),
                    removing = branch_runs.len() - max,
                    "retention limit exceeded"
                );
            }
            for (i, run) in branch_runs.into_iter().enumerate() {
                if i < max {
                    plan.retain.push(run.clone());
                } else {
                    plan.remove.push(run.clone());
                }
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunStatus;

    fn run(branch: &str, run_id: &str, timestamp: &str) -> RunRecord {
        RunRecord {
            run_id: run_id.to_string(),
            branch: branch.to_string(),
            commit_sha: "abc".to_string(),
            timestamp: timestamp.to_string(),
            report_path: format!("reports/{branch}/{run_id}"),
            status: RunStatus::Success,
        }
    }

    fn daily(branch: &str, days: u32) -> Vec<RunRecord> {
        (1..=days)
            .map(|d| run(branch, &format!("{d:03}"), &format!("2024-01-{d:02}T12:00:00Z")))
            .collect()
    }

    fn policy(n: usize) -> RetentionPolicy {
        RetentionPolicy::from_count(n).unwrap()
    }

    #[test]
    fn test_removes_oldest_beyond_limit() {
        let runs = daily("main", 25);
        let plan = policy(20).apply(&runs);
        assert_eq!(plan.retain.len(), 20);
        let mut removed: Vec<&str> = plan.remove.iter().map(|r| r.run_id.as_str()).collect();
        removed.sort();
        assert_eq!(removed, vec!["001", "002", "003", "004", "005"]);
    }

    #[test]
    fn test_branch_local() {
        let mut runs = daily("main", 15);
        runs.extend(daily("feature", 3));
        let plan = policy(10).apply(&runs);
        assert!(plan.remove.iter().all(|r| r.branch == "main"));
        assert_eq!(plan.remove.len(), 5);
        assert_eq!(plan.retain.iter().filter(|r| r.branch == "feature").count(), 3);
    }

    #[test]
    fn test_partition_is_exact() {
        let mut runs = daily("main", 12);
        runs.extend(daily("dev", 7));
        let plan = policy(5).apply(&runs);
        assert_eq!(plan.retain.len() + plan.remove.len(), runs.len());
        for r in &runs {
            let kept = plan.retain.contains(r);
            let removed = plan.remove.contains(r);
            assert!(kept ^ removed, "{} must be in exactly one set", r.run_id);
        }
        for branch in ["main", "dev"] {
            assert!(plan.retain.iter().filter(|r| r.branch == branch).count() <= 5);
        }
    }

    #[test]
    fn test_idempotent() {
        let runs = daily("main", 25);
        let first = policy(20).apply(&runs);
        let second = policy(20).apply(&first.retain);
        assert!(second.remove.is_empty());
        assert_eq!(second.retain, first.retain);
    }

    #[test]
    fn test_under_limit_never_removes_even_with_bad_timestamps() {
        let runs = vec![
            run("main", "1", "not a date"),
            run("main", "2", ""),
            run("main", "3", "2024-01-01T00:00:00Z"),
        ];
        let plan = policy(3).apply(&runs);
        assert!(plan.remove.is_empty());
        assert_eq!(plan.retain.len(), 3);
    }

    #[test]
    fn test_unparseable_timestamps_removed_first() {
        let runs = vec![
            run("main", "1", "2024-01-01T00:00:00Z"),
            run("main", "2", "garbage"),
            run("main", "3", "2024-01-02T00:00:00Z"),
        ];
        let plan = policy(2).apply(&runs);
        assert_eq!(plan.remove.len(), 1);
        assert_eq!(plan.remove[0].run_id, "2");
    }

    #[test]
    fn test_zero_is_rejected() {
        assert!(RetentionPolicy::from_count(0).is_none());
        assert_eq!(RetentionPolicy::default().max_per_branch(), 20);
    }
}
