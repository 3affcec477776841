//! JUnit XML reports (`<testsuites>` / `<testsuite>` / `<testcase>`).
//!
//! Durations in JUnit are seconds.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::core::{TestStats, TestStatus};
use crate::html::{MISSING, fmt_duration, html_escape, test_status_class};
use crate::{ReportError, ReportResult};

const DURATION_TO_SECS: f64 = 1.0;

/// Summary counters as written in `tests=`/`failures=`/`errors=`/`skipped=`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredCounts {
    pub tests: Option<u64>,
    pub failures: Option<u64>,
    pub errors: Option<u64>,
    pub skipped: Option<u64>,
    pub time: Option<f64>,
}

impl DeclaredCounts {
    fn from_element(e: &BytesStart<'_>) -> ReportResult<DeclaredCounts> {
        let mut counts = DeclaredCounts::default();
        for (key, value) in attributes(e)? {
            match key.as_str() {
                "tests" => counts.tests = value.trim().parse().ok(),
                "failures" => counts.failures = value.trim().parse().ok(),
                "errors" => counts.errors = value.trim().parse().ok(),
                // older writers use "disabled"
                "skipped" | "disabled" => {
                    counts.skipped = counts.skipped.or(value.trim().parse().ok())
                }
                "time" => counts.time = parse_seconds(&value),
                _ => {}
            }
        }
        Ok(counts)
    }

    fn failed(&self) -> Option<u64> {
        match (self.failures, self.errors) {
            (None, None) => None,
            (f, e) => Some(f.unwrap_or(0) + e.unwrap_or(0)),
        }
    }

    /// Sum suite-level counters, only when every suite declares `tests=`.
    ///
    /// A suite that declares its total but omits a counter has zero of it.
    /// Callers pass top-level suites only; a parent's counters already
    /// include its nested suites.
    fn sum_suites(suites: &[&JunitSuite]) -> Option<DeclaredCounts> {
        if suites.is_empty() || suites.iter().any(|s| s.declared.tests.is_none()) {
            return None;
        }
        let mut sum = DeclaredCounts {
            tests: Some(0),
            failures: Some(0),
            errors: Some(0),
            skipped: Some(0),
            time: None,
        };
        for suite in suites {
            let d = &suite.declared;
            sum.tests = Some(sum.tests.unwrap_or(0) + d.tests.unwrap_or(0));
            sum.failures = Some(sum.failures.unwrap_or(0) + d.failures.unwrap_or(0));
            sum.errors = Some(sum.errors.unwrap_or(0) + d.errors.unwrap_or(0));
            sum.skipped = Some(sum.skipped.unwrap_or(0) + d.skipped.unwrap_or(0));
        }
        Some(sum)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JunitCase {
    pub name: String,
    pub classname: Option<String>,
    pub status: TestStatus,
    pub duration_secs: Option<f64>,
    /// Failure/error message and body text
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JunitSuite {
    pub name: String,
    pub declared: DeclaredCounts,
    pub cases: Vec<JunitCase>,
    /// Number of enclosing `<testsuite>` elements; 0 for top-level suites
    pub depth: usize,
    /// Summed duration of the suites nested directly inside this one
    nested_secs: Option<f64>,
}

impl JunitSuite {
    pub fn status(&self) -> TestStatus {
        TestStatus::rollup(self.cases.iter().map(|c| c.status))
    }

    /// Case times of this suite and everything nested in it, else the
    /// declared `time=`.
    fn duration_secs(&self) -> Option<f64> {
        let case_times: Vec<f64> = self.cases.iter().filter_map(|c| c.duration_secs).collect();
        if case_times.is_empty() && self.nested_secs.is_none() {
            self.declared.time
        } else {
            Some(case_times.iter().sum::<f64>() + self.nested_secs.unwrap_or(0.0))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JunitReport {
    /// Attributes of the `<testsuites>` root, if the document has one
    pub root: Option<DeclaredCounts>,
    pub suites: Vec<JunitSuite>,
}

impl JunitReport {
    /// Stats trusting declared totals over counted test cases.
    ///
    /// Each counter comes from the `<testsuites>` root when it declares it,
    /// else from the suites' summed attributes, else from counting cases.
    pub fn stats(&self) -> TestStats {
        let counted = TestStats::from_outcomes(
            self.suites.iter().flat_map(|s| s.cases.iter().map(|c| c.status)),
        );
        let root = self.root.clone().unwrap_or_default();
        let suites = DeclaredCounts::sum_suites(&self.top_level()).unwrap_or_default();

        let total = root.tests.or(suites.tests).unwrap_or(counted.total);
        let failed = root.failed().or(suites.failed()).unwrap_or(counted.failed);
        let skipped = root.skipped.or(suites.skipped).unwrap_or(counted.skipped);
        TestStats::from_counts(Some(total), failed, skipped).with_duration(self.duration_secs())
    }

    fn top_level(&self) -> Vec<&JunitSuite> {
        self.suites.iter().filter(|s| s.depth == 0).collect()
    }

    fn duration_secs(&self) -> Option<f64> {
        let suite_times: Vec<f64> = self
            .top_level()
            .iter()
            .filter_map(|s| s.duration_secs())
            .collect();
        if suite_times.is_empty() {
            self.root.as_ref().and_then(|r| r.time)
        } else {
            Some(suite_times.iter().sum())
        }
    }
}

fn parse_seconds(value: &str) -> Option<f64> {
    // some writers emit thousands separators ("1,234.5")
    let v: f64 = value.trim().replace(',', "").parse().ok()?;
    if v.is_finite() && v >= 0.0 {
        Some(v * DURATION_TO_SECS)
    } else {
        None
    }
}

fn attributes(e: &BytesStart<'_>) -> ReportResult<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ReportError::parse("JUnit", err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| ReportError::parse("JUnit", err))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn attribute(attrs: &[(String, String)], key: &str) -> Option<String> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

fn start_case(e: &BytesStart<'_>) -> ReportResult<JunitCase> {
    let attrs = attributes(e)?;
    Ok(JunitCase {
        name: attribute(&attrs, "name").unwrap_or_default(),
        classname: attribute(&attrs, "classname"),
        status: TestStatus::Passed,
        duration_secs: attribute(&attrs, "time").and_then(|t| parse_seconds(&t)),
        message: None,
    })
}

fn start_suite(e: &BytesStart<'_>, depth: usize) -> ReportResult<JunitSuite> {
    let attrs = attributes(e)?;
    Ok(JunitSuite {
        name: attribute(&attrs, "name").unwrap_or_default(),
        declared: DeclaredCounts::from_element(e)?,
        cases: Vec::new(),
        depth,
        nested_secs: None,
    })
}

/// Move a finished suite into the report, crediting its time to the parent.
fn close_suite(open_suites: &mut [JunitSuite], report: &mut JunitReport, suite: JunitSuite) {
    if let (Some(parent), Some(secs)) = (open_suites.last_mut(), suite.duration_secs()) {
        parent.nested_secs = Some(parent.nested_secs.unwrap_or(0.0) + secs);
    }
    report.suites.push(suite);
}

/// Mark the current case with a child outcome element.
fn apply_outcome(case: &mut JunitCase, tag: &[u8], e: &BytesStart<'_>) -> ReportResult<()> {
    match tag {
        b"failure" | b"error" => {
            case.status = TestStatus::Failed;
            let attrs = attributes(e)?;
            if let Some(msg) = attribute(&attrs, "message") {
                case.message = Some(msg);
            }
        }
        // a failure beats a skip marker on the same case
        b"skipped" if case.status != TestStatus::Failed => case.status = TestStatus::Skipped,
        _ => {}
    }
    Ok(())
}

/// Parse a JUnit XML document.
pub fn parse(payload: &str) -> ReportResult<JunitReport> {
    let mut reader = Reader::from_str(payload);
    reader.config_mut().trim_text(true);

    let mut report = JunitReport {
        root: None,
        suites: Vec::new(),
    };
    let mut saw_root = false;
    // stack of open suites; nested suites are flattened on close and keep
    // their depth
    let mut open_suites: Vec<JunitSuite> = Vec::new();
    let mut current_case: Option<JunitCase> = None;
    let mut in_message = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ReportError::parse("JUnit", format!("{e} at byte {}", reader.buffer_position())))?;
        match event {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"testsuites" => {
                saw_root = true;
                report.root = Some(DeclaredCounts::from_element(&e)?);
            }
            Event::Start(e) if e.name().as_ref() == b"testsuite" => {
                saw_root = true;
                let suite = start_suite(&e, open_suites.len())?;
                open_suites.push(suite);
            }
            Event::Empty(e) if e.name().as_ref() == b"testsuite" => {
                saw_root = true;
                let suite = start_suite(&e, open_suites.len())?;
                close_suite(&mut open_suites, &mut report, suite);
            }
            Event::Start(e) if e.name().as_ref() == b"testcase" => {
                current_case = Some(start_case(&e)?);
            }
            Event::Empty(e) if e.name().as_ref() == b"testcase" => {
                let case = start_case(&e)?;
                push_case(&mut open_suites, &mut report, case);
            }
            Event::Start(e) => {
                let name = e.name();
                if let Some(case) = current_case.as_mut() {
                    apply_outcome(case, name.as_ref(), &e)?;
                    in_message = matches!(name.as_ref(), b"failure" | b"error");
                }
            }
            Event::Empty(e) => {
                if let Some(case) = current_case.as_mut() {
                    apply_outcome(case, e.name().as_ref(), &e)?;
                }
            }
            Event::Text(t) if in_message => {
                if let Some(case) = current_case.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| ReportError::parse("JUnit", e))?
                        .into_owned();
                    append_message(case, &text);
                }
            }
            Event::CData(t) if in_message => {
                if let Some(case) = current_case.as_mut() {
                    let text = String::from_utf8_lossy(&t).into_owned();
                    append_message(case, &text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"failure" | b"error" => in_message = false,
                b"testcase" => {
                    if let Some(case) = current_case.take() {
                        push_case(&mut open_suites, &mut report, case);
                    }
                }
                b"testsuite" => {
                    if let Some(suite) = open_suites.pop() {
                        close_suite(&mut open_suites, &mut report, suite);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(ReportError::parse(
            "JUnit",
            "no <testsuites> or <testsuite> element found",
        ));
    }
    Ok(report)
}

fn append_message(case: &mut JunitCase, text: &str) {
    if text.is_empty() {
        return;
    }
    match case.message.as_mut() {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(text);
        }
        None => case.message = Some(text.to_string()),
    }
}

fn push_case(open_suites: &mut Vec<JunitSuite>, report: &mut JunitReport, case: JunitCase) {
    match open_suites.last_mut() {
        Some(suite) => suite.cases.push(case),
        None => {
            // test cases directly under <testsuites>: give them an anonymous suite
            if report.suites.last().is_none_or(|s| !s.name.is_empty()) {
                report.suites.push(JunitSuite {
                    name: String::new(),
                    declared: DeclaredCounts::default(),
                    cases: Vec::new(),
                    depth: 0,
                    nested_secs: None,
                });
            }
            if let Some(suite) = report.suites.last_mut() {
                suite.cases.push(case);
            }
        }
    }
}

/// Render suites as collapsible tables.
pub fn render(report: &JunitReport) -> String {
    let mut out = String::from("<h2>Suites</h2>\n");
    if report.suites.is_empty() {
        out.push_str("<div class=\"empty\">No test suites in this report</div>\n");
        return out;
    }
    for suite in &report.suites {
        let status = suite.status();
        let name = if suite.name.is_empty() {
            "(unnamed suite)".to_string()
        } else {
            html_escape(&suite.name)
        };
        out.push_str(&format!(
            "<details{open}>\n<summary><span class=\"{class}\">{label}</span> {name} &middot; {count} test(s) &middot; {duration}</summary>\n",
            open = if status == TestStatus::Failed { " open" } else { "" },
            class = test_status_class(status),
            label = status.label(),
            name = name,
            count = suite.cases.len(),
            duration = fmt_duration(suite.duration_secs()),
        ));
        out.push_str("<table>\n<tr><th>Test</th><th>Class</th><th>Status</th><th class=\"num\">Duration</th></tr>\n");
        for case in &suite.cases {
            out.push_str(&format!(
                "<tr><td>{}</td><td class=\"mono\">{}</td><td class=\"{}\">{}</td><td class=\"num\">{}</td></tr>\n",
                html_escape(&case.name),
                case.classname
                    .as_deref()
                    .map(html_escape)
                    .unwrap_or_else(|| MISSING.to_string()),
                test_status_class(case.status),
                case.status.label(),
                fmt_duration(case.duration_secs),
            ));
            if let Some(message) = &case.message {
                out.push_str(&format!(
                    "<tr><td colspan=\"4\"><pre>{}</pre></td></tr>\n",
                    html_escape(message)
                ));
            }
        }
        out.push_str("</table>\n</details>\n");
    }
    out
}
