//! Shared HTML building blocks for report, run and index pages.
//!
//! Every page is a single static file with embedded CSS and no JavaScript;
//! `<details>` provides the collapsible sections. All user-controlled strings
//! go through `html_escape`.

use crate::core::{RunStatus, TestStats, TestStatus};

/// Placeholder for absent values.
pub const MISSING: &str = "—";

/// HTML-escape a string for safe insertion into HTML content.
///
/// Escapes: & < > " '
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a duration in seconds for display.
pub fn fmt_duration(secs: Option<f64>) -> String {
    match secs {
        Some(s) if (s * 10.0).round() >= 600.0 => {
            // split after rounding to tenths
            let tenths = (s * 10.0).round() as u64;
            format!("{}m {}.{}s", tenths / 600, tenths % 600 / 10, tenths % 10)
        }
        Some(s) => format!("{:.3}s", s),
        None => MISSING.to_string(),
    }
}

pub fn test_status_class(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "ok",
        TestStatus::Failed => "error",
        TestStatus::Skipped => "skip",
    }
}

pub fn run_status_class(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Success => "ok",
        RunStatus::Failure => "error",
        RunStatus::Pending => "skip",
    }
}

const STYLE: &str = r#"* { box-sizing: border-box; margin: 0; padding: 0; }
body {
  font-family: system-ui, -apple-system, sans-serif;
  background: #1a1a2e;
  color: #e8e8e8;
  padding: 24px;
  max-width: 1100px;
  margin: 0 auto;
}
a { color: #4ecdc4; text-decoration: none; }
a:hover { text-decoration: underline; }
.back { margin-bottom: 16px; font-size: 0.875rem; }
h1 { font-size: 1.5rem; margin-bottom: 8px; }
h2 { font-size: 1.125rem; margin: 24px 0 12px 0; color: #9a9a9a; }
.meta { color: #9a9a9a; font-size: 0.8125rem; margin-bottom: 24px; }
.meta code { background: #16213e; padding: 2px 6px; border-radius: 3px; font-family: monospace; }
.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(120px, 1fr)); gap: 12px; margin-bottom: 16px; }
.card { background: #16213e; border: 1px solid #2d3a5c; border-radius: 8px; padding: 12px; text-align: center; }
.card-value { font-size: 1.5rem; font-weight: 700; }
.card-label { font-size: 0.75rem; color: #9a9a9a; text-transform: uppercase; }
table { width: 100%; border-collapse: collapse; font-size: 0.875rem; background: #16213e; margin-bottom: 16px; }
th, td { padding: 8px 12px; text-align: left; border-bottom: 1px solid #2d3a5c; }
th { background: #1a1a2e; color: #9a9a9a; font-weight: 600; font-size: 0.75rem; text-transform: uppercase; }
.num { text-align: right; font-family: monospace; }
.mono { font-family: monospace; }
details { margin: 8px 0; }
summary { cursor: pointer; padding: 8px; background: #16213e; border-radius: 4px; }
summary:hover { background: #1f2b47; }
pre { background: #16213e; padding: 12px; border-radius: 4px; overflow-x: auto; font-size: 0.75rem; line-height: 1.4; white-space: pre-wrap; word-break: break-all; }
.empty { color: #9a9a9a; font-style: italic; padding: 24px; text-align: center; background: #16213e; border-radius: 8px; }
.notice { color: #ff6b6b; padding: 16px; background: #16213e; border-radius: 8px; margin-bottom: 16px; }
.generated { color: #9a9a9a; font-size: 0.75rem; margin-top: 32px; }
.ok { color: #4ecdc4; }
.error { color: #ff6b6b; }
.skip { color: #ffd93d; }"#;

/// Wrap a body fragment into a complete document.
///
/// `title` is escaped here; `header_html` and `body_html` must already be
/// safe HTML. `generated_at` is the only time-dependent content of a page.
pub fn render_page(title: &str, header_html: &str, body_html: &str, generated_at: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>
{style}
</style>
</head>
<body>
{header_html}
{body_html}
<div class="generated">Generated at {generated_at}</div>
</body>
</html>
"#,
        title = html_escape(title),
        style = STYLE,
        header_html = header_html,
        body_html = body_html,
        generated_at = html_escape(generated_at),
    )
}

/// Summary cards for a stats block.
pub fn render_stats_cards(stats: &TestStats) -> String {
    let mut out = String::from("<div class=\"cards\">\n");
    let cards: [(&str, String, &str); 6] = [
        ("Total", stats.total.to_string(), ""),
        ("Passed", stats.passed.to_string(), "ok"),
        ("Failed", stats.failed.to_string(), "error"),
        ("Skipped", stats.skipped.to_string(), "skip"),
        ("Duration", fmt_duration(stats.duration), ""),
        (
            "Pass rate",
            stats
                .pass_rate()
                .map(|r| format!("{:.1}%", r))
                .unwrap_or_else(|| MISSING.to_string()),
            "",
        ),
    ];
    for (label, value, class) in cards {
        out.push_str(&format!(
            "<div class=\"card\"><div class=\"card-value {class}\">{value}</div><div class=\"card-label\">{label}</div></div>\n"
        ));
    }
    out.push_str("</div>\n");
    if let Some(cov) = &stats.coverage {
        out.push_str(&format!(
            "<table>\n<tr><th>Coverage</th><th class=\"num\">Lines</th><th class=\"num\">Branches</th><th class=\"num\">Functions</th><th class=\"num\">Statements</th></tr>\n<tr><td>Percent</td><td class=\"num\">{:.2}%</td><td class=\"num\">{:.2}%</td><td class=\"num\">{:.2}%</td><td class=\"num\">{:.2}%</td></tr>\n</table>\n",
            cov.lines, cov.branches, cov.functions, cov.statements
        ));
    }
    out
}

/// Notice block shown in place of report content when parsing failed.
pub fn render_parse_failure(format_label: &str, message: &str) -> String {
    format!(
        "<div class=\"notice\"><strong>Failed to parse report</strong> ({}): <pre>{}</pre></div>\n",
        html_escape(format_label),
        html_escape(message)
    )
}
