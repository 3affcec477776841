//! Static HTML for the global index (`reports/index.html`) and the
//! per-branch indexes (`reports/<branch>/index.html`).

use crate::core::RunMetadata;
use crate::formats::ReportFormat;
use crate::html::{fmt_duration, html_escape, render_page, run_status_class};
use crate::storage::{INDEX_FILE, run_segment_path, sanitize_segment};

use super::index::{BranchRuns, WikiIndex};

/// Marker rendered when no run has been published yet.
pub const NO_REPORTS_MARKER: &str = "No reports yet";

fn formats_label(formats: &[ReportFormat]) -> String {
    if formats.is_empty() {
        return "none".to_string();
    }
    formats.iter().map(|f| f.label()).collect::<Vec<_>>().join(", ")
}

/// Table of runs. `href` maps a run to its link relative to the page.
fn render_runs_table(
    runs: &[RunMetadata],
    show_branch: bool,
    href: impl Fn(&RunMetadata) -> String,
) -> String {
    let mut out = String::from("<table>\n<tr><th>Run</th>");
    if show_branch {
        out.push_str("<th>Branch</th>");
    }
    out.push_str(
        "<th>Commit</th><th>Timestamp</th><th>Status</th><th class=\"num\">Total</th><th class=\"num\">Passed</th><th class=\"num\">Failed</th><th class=\"num\">Skipped</th><th class=\"num\">Duration</th><th>Formats</th></tr>\n",
    );
    for run in runs {
        let record = &run.record;
        out.push_str(&format!(
            "<tr><td><a href=\"{}\">{}</a></td>",
            html_escape(&href(run)),
            html_escape(&record.run_id)
        ));
        if show_branch {
            out.push_str(&format!("<td>{}</td>", html_escape(&record.branch)));
        }
        out.push_str(&format!(
            "<td class=\"mono\">{}</td><td>{}</td><td class=\"{}\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td>{}</td></tr>\n",
            html_escape(record.short_sha()),
            html_escape(&record.timestamp),
            run_status_class(record.status),
            record.status.label(),
            run.stats.total,
            run.stats.passed,
            run.stats.failed,
            run.stats.skipped,
            fmt_duration(run.stats.duration),
            formats_label(&run.formats),
        ));
    }
    out.push_str("</table>\n");
    out
}

fn render_latest_run(run: &RunMetadata) -> String {
    let record = &run.record;
    format!(
        "<div class=\"cards\">\n<div class=\"card\"><div class=\"card-value {class}\">{status}</div><div class=\"card-label\">Status</div></div>\n<div class=\"card\"><div class=\"card-value\">{passed}/{total}</div><div class=\"card-label\">Passed</div></div>\n<div class=\"card\"><div class=\"card-value error\">{failed}</div><div class=\"card-label\">Failed</div></div>\n<div class=\"card\"><div class=\"card-value skip\">{skipped}</div><div class=\"card-label\">Skipped</div></div>\n</div>\n<div class=\"meta\"><a href=\"{href}\">Run {run_id}</a> on <code>{branch}</code> at <code>{sha}</code>, {timestamp}</div>\n",
        class = run_status_class(record.status),
        status = record.status.label(),
        passed = run.stats.passed,
        total = run.stats.total,
        failed = run.stats.failed,
        skipped = run.stats.skipped,
        href = html_escape(&format!(
            "{}/{}",
            run_segment_path(&record.branch, &record.run_id),
            INDEX_FILE
        )),
        run_id = html_escape(&record.run_id),
        branch = html_escape(&record.branch),
        sha = html_escape(record.short_sha()),
        timestamp = html_escape(&record.timestamp),
    )
}

/// Global index: latest run, recent runs, then one section per branch.
pub fn render_global_index(index: &WikiIndex, generated_at: &str) -> String {
    let header = "<h1>Test Reports</h1>\n";

    let Some(last_run) = &index.last_run else {
        let body = format!(
            "<div class=\"empty\">{NO_REPORTS_MARKER}. Reports appear here after the first published run.</div>\n"
        );
        return render_page("Test Reports", header, &body, generated_at);
    };

    let run_href = |run: &RunMetadata| {
        format!(
            "{}/{}",
            run_segment_path(&run.record.branch, &run.record.run_id),
            INDEX_FILE
        )
    };

    let mut body = String::new();
    body.push_str("<h2>Latest run</h2>\n");
    body.push_str(&render_latest_run(last_run));
    body.push_str("<h2>Recent runs</h2>\n");
    body.push_str(&render_runs_table(&index.recent_runs, true, run_href));
    body.push_str("<h2>Branches</h2>\n");
    for branch in &index.branches {
        body.push_str(&format!(
            "<details>\n<summary><a href=\"{}/{}\">{}</a> &middot; {} run(s)</summary>\n",
            html_escape(&sanitize_segment(&branch.branch)),
            INDEX_FILE,
            html_escape(&branch.branch),
            branch.total_runs
        ));
        body.push_str(&render_runs_table(&branch.runs, false, run_href));
        body.push_str("</details>\n");
    }

    render_page("Test Reports", header, &body, generated_at)
}

/// Page listing the runs of a single branch.
pub fn render_branch_index(branch: &BranchRuns, generated_at: &str) -> String {
    let header = format!(
        "<div class=\"back\"><a href=\"../{INDEX_FILE}\">&larr; All branches</a></div>\n<h1>{}</h1>\n<div class=\"meta\">{} run(s)</div>\n",
        html_escape(&branch.branch),
        branch.total_runs
    );
    let body = if branch.runs.is_empty() {
        format!("<div class=\"empty\">{NO_REPORTS_MARKER}</div>\n")
    } else {
        render_runs_table(&branch.runs, false, |run| {
            format!("{}/{}", sanitize_segment(&run.record.run_id), INDEX_FILE)
        })
    };
    render_page(
        &format!("Test Reports - {}", branch.branch),
        &header,
        &body,
        generated_at,
    )
}
