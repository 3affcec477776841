//! Derived index over every published run.
//!
//! The index is always rebuilt from the full set of sidecars; nothing is
//! updated incrementally.

use crate::core::{RunMetadata, sort_metadata_newest_first};

use super::home_md::render_home_markdown;
use super::index_html::{render_branch_index, render_global_index};

pub const DEFAULT_MAX_RECENT_RUNS: usize = 10;
pub const DEFAULT_MAX_RUNS_PER_BRANCH: usize = 20;

/// Runs of one branch, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchRuns {
    pub branch: String,
    /// Capped at `max_runs_per_branch`
    pub runs: Vec<RunMetadata>,
    /// Number of runs before the cap was applied
    pub total_runs: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WikiIndex {
    /// Most recent run across all branches
    pub last_run: Option<RunMetadata>,
    pub recent_runs: Vec<RunMetadata>,
    /// Sorted by branch name; branches without runs are absent
    pub branches: Vec<BranchRuns>,
}

impl WikiIndex {
    pub fn build(runs: &[RunMetadata], max_recent_runs: usize, max_runs_per_branch: usize) -> Self {
        let mut sorted = runs.to_vec();
        sort_metadata_newest_first(&mut sorted);

        let mut branches: Vec<BranchRuns> = Vec::new();
        let mut names: Vec<&str> = sorted.iter().map(|r| r.record.branch.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        for name in names {
            // stable filter of an already sorted list keeps newest first
            let branch_runs: Vec<RunMetadata> = sorted
                .iter()
                .filter(|r| r.record.branch == name)
                .cloned()
                .collect();
            let total_runs = branch_runs.len();
            branches.push(BranchRuns {
                branch: name.to_string(),
                runs: branch_runs.into_iter().take(max_runs_per_branch).collect(),
                total_runs,
            });
        }

        WikiIndex {
            last_run: sorted.first().cloned(),
            recent_runs: sorted.iter().take(max_recent_runs).cloned().collect(),
            branches,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_run.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub max_recent_runs: usize,
    pub max_runs_per_branch: usize,
    /// Stamp rendered on every page; the only time-dependent output
    pub generated_at: String,
}

impl IndexOptions {
    pub fn new(generated_at: impl Into<String>) -> Self {
        IndexOptions {
            max_recent_runs: DEFAULT_MAX_RECENT_RUNS,
            max_runs_per_branch: DEFAULT_MAX_RUNS_PER_BRANCH,
            generated_at: generated_at.into(),
        }
    }
}

/// Rendered index pages, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocuments {
    pub global: String,
    /// One page per branch, in branch name order
    pub branches: Vec<(String, String)>,
    pub home_markdown: String,
}

#[derive(Debug, Clone)]
pub struct IndexGenerator {
    options: IndexOptions,
}

impl IndexGenerator {
    pub fn new(options: IndexOptions) -> Self {
        IndexGenerator { options }
    }

    pub fn index(&self, runs: &[RunMetadata]) -> WikiIndex {
        WikiIndex::build(
            runs,
            self.options.max_recent_runs,
            self.options.max_runs_per_branch,
        )
    }

    /// Deterministic for a given run set and `generated_at`.
    pub fn generate(&self, runs: &[RunMetadata]) -> IndexDocuments {
        let index = self.index(runs);
        let generated_at = &self.options.generated_at;
        IndexDocuments {
            global: render_global_index(&index, generated_at),
            branches: index
                .branches
                .iter()
                .map(|b| (b.branch.clone(), render_branch_index(b, generated_at)))
                .collect(),
            home_markdown: render_home_markdown(&index, generated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RunRecord, RunStatus};

    fn meta(branch: &str, run_id: &str, timestamp: &str) -> RunMetadata {
        RunMetadata::new(RunRecord {
            run_id: run_id.to_string(),
            branch: branch.to_string(),
            commit_sha: "abcdef0123".to_string(),
            timestamp: timestamp.to_string(),
            report_path: format!("reports/{branch}/{run_id}"),
            status: RunStatus::Success,
        })
    }

    fn sample() -> Vec<RunMetadata> {
        vec![
            meta("main", "1", "2024-01-01T00:00:00Z"),
            meta("feature", "7", "2024-01-03T00:00:00Z"),
            meta("main", "2", "2024-01-02T00:00:00Z"),
            meta("main", "3", "2024-01-03T00:00:00Z"),
            meta("main", "0", "broken"),
        ]
    }

    #[test]
    fn test_latest_and_recent_order() {
        let index = WikiIndex::build(&sample(), 3, 20);
        let last = index.last_run.as_ref().unwrap();
        // equal timestamps: run_id descending
        assert_eq!(last.record.run_id, "7");
        let ids: Vec<&str> = index.recent_runs.iter().map(|r| r.record.run_id.as_str()).collect();
        assert_eq!(ids, vec!["7", "3", "2"]);
    }

    #[test]
    fn test_recent_runs_sorted_invariant() {
        let index = WikiIndex::build(&sample(), 10, 20);
        for pair in index.recent_runs.windows(2) {
            let (a, b) = (&pair[0].record, &pair[1].record);
            match (a.parsed_timestamp(), b.parsed_timestamp()) {
                (Some(ta), Some(tb)) => {
                    assert!(ta >= tb);
                    if ta == tb {
                        assert!(a.run_id >= b.run_id);
                    }
                }
                (Some(_), None) => {}
                (None, Some(_)) => panic!("unparseable timestamp sorted before a valid one"),
                (None, None) => assert!(a.run_id >= b.run_id),
            }
        }
    }

    #[test]
    fn test_branches_sorted_and_capped() {
        let index = WikiIndex::build(&sample(), 10, 2);
        let names: Vec<&str> = index.branches.iter().map(|b| b.branch.as_str()).collect();
        assert_eq!(names, vec!["feature", "main"]);
        let main = &index.branches[1];
        assert_eq!(main.total_runs, 4);
        let ids: Vec<&str> = main.runs.iter().map(|r| r.record.run_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[test]
    fn test_empty_index() {
        let index = WikiIndex::build(&[], 10, 20);
        assert!(index.is_empty());
        assert!(index.branches.is_empty());
    }

    #[test]
    fn test_generate_is_idempotent_and_order_independent() {
        let generator = IndexGenerator::new(IndexOptions::new("2024-02-01T00:00:00Z"));
        let mut runs = sample();
        let a = generator.generate(&runs);
        runs.reverse();
        let b = generator.generate(&runs);
        assert_eq!(a, b);
        assert_eq!(a.branches.len(), 2);
    }
}
