//! `Home.md`: markdown landing page for wiki viewers that do not render
//! the HTML index.

use crate::core::RunMetadata;
use crate::storage::{INDEX_FILE, StoreLayout};

use super::index::WikiIndex;
use super::index_html::NO_REPORTS_MARKER;

/// Escape characters that break markdown table cells and link text.
fn md_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '|' | '[' | ']' | '*' | '_' | '`' | '\\' | '<' | '>' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

fn run_link(run: &RunMetadata) -> String {
    format!(
        "[{}]({}/{})",
        md_escape(&run.record.run_id),
        StoreLayout::run_report_path(&run.record.branch, &run.record.run_id),
        INDEX_FILE
    )
}

fn run_row(run: &RunMetadata, show_branch: bool) -> String {
    let record = &run.record;
    let mut row = format!("| {} |", run_link(run));
    if show_branch {
        row.push_str(&format!(" {} |", md_escape(&record.branch)));
    }
    row.push_str(&format!(
        " `{}` | {} | {} | {} | {} | {} |\n",
        record.short_sha(),
        md_escape(&record.timestamp),
        record.status.label(),
        run.stats.passed,
        run.stats.failed,
        run.stats.skipped
    ));
    row
}

fn table_header(show_branch: bool) -> String {
    if show_branch {
        "| Run | Branch | Commit | Timestamp | Status | Passed | Failed | Skipped |\n|---|---|---|---|---|---|---|---|\n".to_string()
    } else {
        "| Run | Commit | Timestamp | Status | Passed | Failed | Skipped |\n|---|---|---|---|---|---|---|\n".to_string()
    }
}

pub fn render_home_markdown(index: &WikiIndex, generated_at: &str) -> String {
    let mut out = String::from("# Test Reports\n\n");

    let Some(last) = &index.last_run else {
        out.push_str(&format!("_{NO_REPORTS_MARKER}._\n\n"));
        out.push_str(&format!("_Generated at {}_\n", md_escape(generated_at)));
        return out;
    };

    out.push_str(&format!(
        "[Full HTML index]({}/{})\n\n",
        crate::storage::REPORTS_DIR,
        INDEX_FILE
    ));

    out.push_str("## Latest run\n\n");
    out.push_str(&format!(
        "**{}** run {} on `{}` at `{}` ({}): {} passed, {} failed, {} skipped\n\n",
        last.record.status.label(),
        run_link(last),
        last.record.branch.replace('`', "'"),
        last.record.short_sha(),
        md_escape(&last.record.timestamp),
        last.stats.passed,
        last.stats.failed,
        last.stats.skipped
    ));

    out.push_str("## Recent runs\n\n");
    out.push_str(&table_header(true));
    for run in &index.recent_runs {
        out.push_str(&run_row(run, true));
    }
    out.push('\n');

    out.push_str("## Branches\n\n");
    for branch in &index.branches {
        out.push_str(&format!(
            "### {} ({} runs)\n\n",
            md_escape(&branch.branch),
            branch.total_runs
        ));
        out.push_str(&table_header(false));
        for run in &branch.runs {
            out.push_str(&run_row(run, false));
        }
        out.push('\n');
    }

    out.push_str(&format!("_Generated at {}_\n", md_escape(generated_at)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RunRecord, RunStatus};

    fn meta(branch: &str, run_id: &str) -> RunMetadata {
        RunMetadata::new(RunRecord {
            run_id: run_id.to_string(),
            branch: branch.to_string(),
            commit_sha: "1234567890".to_string(),
            timestamp: "2024-01-15T12:00:00Z".to_string(),
            report_path: String::new(),
            status: RunStatus::Success,
        })
    }

    #[test]
    fn test_empty_home() {
        let md = render_home_markdown(&WikiIndex::default(), "T");
        assert!(md.contains(NO_REPORTS_MARKER));
        assert!(!md.contains("## Recent runs"));
    }

    #[test]
    fn test_home_links_into_reports() {
        let index = WikiIndex::build(&[meta("feature/a|b", "3")], 10, 20);
        let md = render_home_markdown(&index, "T");
        assert!(md.contains("[3](reports/feature-a-b-960c8b31/3/index.html)"));
        assert!(md.contains("### feature/a\\|b (1 runs)"));
        assert!(md.contains("`1234567`"));
        assert!(md.ends_with("_Generated at T_\n"));
    }

    #[test]
    fn test_md_escape() {
        assert_eq!(md_escape("a|b"), "a\\|b");
        assert_eq!(md_escape("x\ny"), "x y");
    }
}
