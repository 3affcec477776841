//! The per-run `index.html` page.

use crate::core::{RunMetadata, RunRecord};
use crate::html::{MISSING, fmt_duration, html_escape, render_page, render_stats_cards};
use crate::storage::INDEX_FILE;

/// Marker on the page of a run published without any report.
pub const FALLBACK_MARKER: &str = "No test reports were available for this run";

fn run_header(record: &RunRecord) -> String {
    format!(
        "<div class=\"back\"><a href=\"../{INDEX_FILE}\">&larr; {branch}</a> &middot; <a href=\"../../{INDEX_FILE}\">All branches</a></div>\n<h1>Run {run_id}</h1>\n<div class=\"meta\">Branch <code>{branch}</code> &middot; Commit <code>{sha}</code> &middot; {timestamp} &middot; <span class=\"{class}\">{status}</span></div>\n",
        branch = html_escape(&record.branch),
        run_id = html_escape(&record.run_id),
        sha = html_escape(&record.commit_sha),
        timestamp = html_escape(&record.timestamp),
        class = crate::html::run_status_class(record.status),
        status = record.status.label(),
    )
}

fn title(record: &RunRecord) -> String {
    format!("{} #{}", record.branch, record.run_id)
}

fn render_unrecognized(files: &[String]) -> String {
    if files.is_empty() {
        return String::new();
    }
    let mut out = format!(
        "<details>\n<summary>{} unrecognized file(s)</summary>\n<ul>\n",
        files.len()
    );
    for file in files {
        out.push_str(&format!("<li class=\"mono\">{}</li>\n", html_escape(file)));
    }
    out.push_str("</ul>\n</details>\n");
    out
}

/// Page for a run without report artifacts.
pub fn render_fallback_page(metadata: &RunMetadata, generated_at: &str) -> String {
    let record = &metadata.record;
    let body = format!(
        "<div class=\"empty\">{FALLBACK_MARKER}.<br>Branch {} &middot; Commit {} &middot; {}</div>\n{}",
        html_escape(&record.branch),
        html_escape(&record.commit_sha),
        html_escape(&record.timestamp),
        render_unrecognized(&metadata.unrecognized),
    );
    render_page(&title(record), &run_header(record), &body, generated_at)
}

/// Page summarizing every converted report of a run.
pub fn render_run_page(metadata: &RunMetadata, generated_at: &str) -> String {
    if metadata.reports.is_empty() {
        return render_fallback_page(metadata, generated_at);
    }

    let mut body = String::from("<h2>Summary</h2>\n");
    body.push_str(&render_stats_cards(&metadata.stats));

    body.push_str("<h2>Reports</h2>\n<table>\n<tr><th>Report</th><th>Format</th><th>Package</th><th>Source</th><th class=\"num\">Total</th><th class=\"num\">Passed</th><th class=\"num\">Failed</th><th class=\"num\">Skipped</th><th class=\"num\">Duration</th></tr>\n");
    for entry in &metadata.reports {
        let note = if entry.parse_error.is_some() {
            " <span class=\"error\">(parse error)</span>"
        } else {
            ""
        };
        body.push_str(&format!(
            "<tr><td><a href=\"{file}\">{file}</a>{note}</td><td>{format}</td><td>{package}</td><td class=\"mono\">{source}</td><td class=\"num\">{total}</td><td class=\"num ok\">{passed}</td><td class=\"num error\">{failed}</td><td class=\"num skip\">{skipped}</td><td class=\"num\">{duration}</td></tr>\n",
            file = html_escape(&entry.file),
            format = entry.format.label(),
            package = html_escape(&entry.package),
            source = html_escape(&entry.source),
            total = entry.stats.total,
            passed = entry.stats.passed,
            failed = entry.stats.failed,
            skipped = entry.stats.skipped,
            duration = fmt_duration(entry.stats.duration),
        ));
    }
    body.push_str("</table>\n");

    let formats = if metadata.formats.is_empty() {
        MISSING.to_string()
    } else {
        metadata
            .formats
            .iter()
            .map(|f| f.label())
            .collect::<Vec<_>>()
            .join(", ")
    };
    body.push_str(&format!("<div class=\"meta\">Formats: {formats}</div>\n"));
    body.push_str(&render_unrecognized(&metadata.unrecognized));

    render_page(
        &title(&metadata.record),
        &run_header(&metadata.record),
        &body,
        generated_at,
    )
}
