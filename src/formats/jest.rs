//! Jest `--json` reports; Vitest's json reporter emits the same shape.
//!
//! Durations are milliseconds.

use serde::Deserialize;

use crate::core::{TestStats, TestStatus};
use crate::html::{fmt_duration, html_escape, test_status_class};
use crate::{ReportError, ReportResult};

const DURATION_TO_SECS: f64 = 0.001;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    num_total_tests: Option<u64>,
    num_failed_tests: Option<u64>,
    num_pending_tests: Option<u64>,
    num_todo_tests: Option<u64>,
    success: Option<bool>,
    #[serde(default)]
    test_results: Vec<RawTestFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTestFile {
    #[serde(default)]
    name: String,
    status: Option<String>,
    start_time: Option<f64>,
    end_time: Option<f64>,
    message: Option<String>,
    #[serde(default)]
    assertion_results: Vec<RawAssertion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssertion {
    #[serde(default)]
    ancestor_titles: Vec<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    status: String,
    duration: Option<f64>,
    #[serde(default)]
    failure_messages: Vec<String>,
}

/// Summary counters declared at the top of the report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredCounts {
    pub total: Option<u64>,
    pub failed: Option<u64>,
    pub pending: Option<u64>,
    pub todo: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JestTest {
    pub title: String,
    pub ancestors: Vec<String>,
    pub status: TestStatus,
    pub duration_secs: Option<f64>,
    pub failure_messages: Vec<String>,
}

impl JestTest {
    pub fn full_title(&self) -> String {
        let mut parts = self.ancestors.clone();
        parts.push(self.title.clone());
        parts.join(" › ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JestFile {
    pub name: String,
    /// Status reported for the file itself ("failed" when the suite crashed)
    pub declared_status: Option<TestStatus>,
    pub wall_time_secs: Option<f64>,
    pub message: Option<String>,
    pub tests: Vec<JestTest>,
}

impl JestFile {
    pub fn status(&self) -> TestStatus {
        if self.tests.is_empty() {
            return self.declared_status.unwrap_or(TestStatus::Skipped);
        }
        let rolled = TestStatus::rollup(self.tests.iter().map(|t| t.status));
        match self.declared_status {
            Some(TestStatus::Failed) => TestStatus::Failed,
            _ => rolled,
        }
    }

    fn duration_secs(&self) -> Option<f64> {
        let times: Vec<f64> = self.tests.iter().filter_map(|t| t.duration_secs).collect();
        if times.is_empty() {
            self.wall_time_secs
        } else {
            Some(times.iter().sum())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JestReport {
    pub declared: DeclaredCounts,
    pub success: Option<bool>,
    pub files: Vec<JestFile>,
}

impl JestReport {
    /// Stats trusting the declared `num*Tests` counters over counted results.
    pub fn stats(&self) -> TestStats {
        let counted = TestStats::from_outcomes(
            self.files.iter().flat_map(|f| f.tests.iter().map(|t| t.status)),
        );
        let skipped = match (self.declared.pending, self.declared.todo) {
            (None, None) => counted.skipped,
            (p, t) => p.unwrap_or(0) + t.unwrap_or(0),
        };
        let failed = self.declared.failed.unwrap_or(counted.failed);
        let total = self.declared.total.unwrap_or(counted.total);

        let durations: Vec<f64> = self.files.iter().filter_map(|f| f.duration_secs()).collect();
        let duration = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum())
        };
        TestStats::from_counts(Some(total), failed, skipped).with_duration(duration)
    }
}

fn map_status(status: &str) -> TestStatus {
    match status {
        "passed" => TestStatus::Passed,
        "failed" => TestStatus::Failed,
        // pending, skipped, todo, disabled
        _ => TestStatus::Skipped,
    }
}

fn ms_to_secs(ms: f64) -> Option<f64> {
    if ms.is_finite() && ms >= 0.0 {
        Some(ms * DURATION_TO_SECS)
    } else {
        None
    }
}

/// Parse a Jest/Vitest JSON report. `label` names the format in errors.
pub fn parse(payload: &str, label: &'static str) -> ReportResult<JestReport> {
    let raw: RawReport =
        serde_json::from_str(payload).map_err(|e| ReportError::parse(label, e))?;

    let files = raw
        .test_results
        .into_iter()
        .map(|file| {
            let wall_time_secs = match (file.start_time, file.end_time) {
                (Some(start), Some(end)) if end >= start => ms_to_secs(end - start),
                _ => None,
            };
            JestFile {
                name: file.name,
                declared_status: file.status.as_deref().map(map_status),
                wall_time_secs,
                message: file.message.filter(|m| !m.trim().is_empty()),
                tests: file
                    .assertion_results
                    .into_iter()
                    .map(|a| JestTest {
                        title: a.title,
                        ancestors: a.ancestor_titles,
                        status: map_status(&a.status),
                        duration_secs: a.duration.and_then(ms_to_secs),
                        failure_messages: a.failure_messages,
                    })
                    .collect(),
            }
        })
        .collect();

    Ok(JestReport {
        declared: DeclaredCounts {
            total: raw.num_total_tests,
            failed: raw.num_failed_tests,
            pending: raw.num_pending_tests,
            todo: raw.num_todo_tests,
        },
        success: raw.success,
        files,
    })
}

/// Drop ANSI colour sequences that Jest embeds in failure messages.
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Render test files as collapsible tables.
pub fn render(report: &JestReport) -> String {
    let mut out = String::new();
    if let Some(success) = report.success {
        out.push_str(&format!(
            "<div class=\"meta\">Runner result: <span class=\"{}\">{}</span></div>\n",
            if success { "ok" } else { "error" },
            if success { "success" } else { "failure" }
        ));
    }
    out.push_str("<h2>Test files</h2>\n");
    if report.files.is_empty() {
        out.push_str("<div class=\"empty\">No test files in this report</div>\n");
        return out;
    }
    for file in &report.files {
        let status = file.status();
        out.push_str(&format!(
            "<details{open}>\n<summary><span class=\"{class}\">{label}</span> <span class=\"mono\">{name}</span> &middot; {count} test(s) &middot; {duration}</summary>\n",
            open = if status == TestStatus::Failed { " open" } else { "" },
            class = test_status_class(status),
            label = status.label(),
            name = html_escape(&file.name),
            count = file.tests.len(),
            duration = fmt_duration(file.duration_secs()),
        ));
        if let Some(message) = &file.message {
            out.push_str(&format!("<pre>{}</pre>\n", html_escape(&strip_ansi(message))));
        }
        out.push_str("<table>\n<tr><th>Test</th><th>Status</th><th class=\"num\">Duration</th></tr>\n");
        for test in &file.tests {
            out.push_str(&format!(
                "<tr><td>{}</td><td class=\"{}\">{}</td><td class=\"num\">{}</td></tr>\n",
                html_escape(&test.full_title()),
                test_status_class(test.status),
                test.status.label(),
                fmt_duration(test.duration_secs),
            ));
            if !test.failure_messages.is_empty() {
                let joined = test
                    .failure_messages
                    .iter()
                    .map(|m| strip_ansi(m))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                out.push_str(&format!(
                    "<tr><td colspan=\"3\"><pre>{}</pre></td></tr>\n",
                    html_escape(&joined)
                ));
            }
        }
        out.push_str("</table>\n</details>\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "numTotalTestSuites": 2,
  "numTotalTests": 10,
  "numPassedTests": 8,
  "numFailedTests": 1,
  "numPendingTests": 1,
  "numTodoTests": 0,
  "numRuntimeErrorTestSuites": 0,
  "success": false,
  "startTime": 1705320000000,
  "testResults": [
    {
      "name": "/repo/packages/ui/src/button.test.tsx",
      "status": "failed",
      "startTime": 1705320000000,
      "endTime": 1705320001500,
      "message": "",
      "assertionResults": [
        {"ancestorTitles": ["Button"], "title": "renders", "status": "passed", "duration": 120, "failureMessages": []},
        {"ancestorTitles": ["Button"], "title": "clicks", "status": "failed", "duration": 80, "failureMessages": ["\u001b[31mExpected\u001b[39m true"]},
        {"ancestorTitles": ["Button"], "title": "hovers", "status": "pending", "duration": null, "failureMessages": []}
      ]
    },
    {
      "name": "/repo/packages/ui/src/input.test.tsx",
      "status": "passed",
      "startTime": 1705320000000,
      "endTime": 1705320000900,
      "assertionResults": [
        {"ancestorTitles": [], "title": "a", "status": "passed", "duration": 100},
        {"ancestorTitles": [], "title": "b", "status": "passed", "duration": 100},
        {"ancestorTitles": [], "title": "c", "status": "passed", "duration": 100},
        {"ancestorTitles": [], "title": "d", "status": "passed", "duration": 100},
        {"ancestorTitles": [], "title": "e", "status": "passed", "duration": 100},
        {"ancestorTitles": [], "title": "f", "status": "passed", "duration": 100},
        {"ancestorTitles": [], "title": "g", "status": "passed", "duration": 100}
      ]
    }
  ]
}"#;

    #[test]
    fn test_parse_declared_counts() {
        let stats = parse(SAMPLE, "Jest").unwrap().stats();
        assert_eq!(
            (stats.total, stats.passed, stats.failed, stats.skipped),
            (10, 8, 1, 1)
        );
        // 120 + 80 + 700 ms
        assert_eq!(stats.duration, Some(0.9));
    }

    #[test]
    fn test_file_rollup() {
        let report = parse(SAMPLE, "Jest").unwrap();
        assert_eq!(report.files[0].status(), TestStatus::Failed);
        assert_eq!(report.files[1].status(), TestStatus::Passed);
        assert_eq!(report.files[0].tests[0].full_title(), "Button › renders");
        assert_eq!(report.files[0].message, None);
    }

    #[test]
    fn test_counts_results_without_summary() {
        let json = r#"{"testResults":[{"name":"a.test.js","assertionResults":[
            {"title":"x","status":"passed"},
            {"title":"y","status":"todo"},
            {"title":"z","status":"failed","failureMessages":["boom"]}
        ]}]}"#;
        let stats = parse(json, "Jest").unwrap().stats();
        assert_eq!(
            (stats.total, stats.passed, stats.failed, stats.skipped),
            (3, 1, 1, 1)
        );
        assert_eq!(stats.duration, None);
    }

    #[test]
    fn test_wall_time_fallback() {
        let json = r#"{"numTotalTests":1,"testResults":[{"name":"a","startTime":1000,"endTime":3500,"assertionResults":[{"title":"x","status":"passed"}]}]}"#;
        let stats = parse(json, "Jest").unwrap().stats();
        assert_eq!(stats.duration, Some(2.5));
    }

    #[test]
    fn test_todo_merged_into_skipped() {
        let json = r#"{"numTotalTests":4,"numFailedTests":0,"numPendingTests":1,"numTodoTests":2,"testResults":[]}"#;
        let stats = parse(json, "Jest").unwrap().stats();
        assert_eq!((stats.passed, stats.skipped), (1, 3));
    }

    #[test]
    fn test_not_an_object_is_error() {
        assert!(parse("[]", "Jest").is_err());
        assert!(parse("{\"numTotalTests\": ", "Jest").is_err());
    }

    #[test]
    fn test_render_strips_ansi_and_escapes() {
        let html = render(&parse(SAMPLE, "Jest").unwrap());
        assert!(html.contains("Expected true"));
        assert!(!html.contains('\u{1b}'));
        assert!(html.contains("button.test.tsx"));
        assert!(html.contains("Runner result"));
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\u{1b}[1m\u{1b}[31mred\u{1b}[0m plain"), "red plain");
        assert_eq!(strip_ansi("no escapes"), "no escapes");
    }
}
