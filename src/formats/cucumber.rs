//! Cucumber JSON reports: features containing scenarios containing steps.
//!
//! Counts are per scenario; step durations are nanoseconds.

use serde::Deserialize;

use crate::core::{TestStats, TestStatus};
use crate::html::{fmt_duration, html_escape, test_status_class};
use crate::{ReportError, ReportResult};

const DURATION_TO_SECS: f64 = 1e-9;

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    elements: Vec<RawElement>,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    keyword: String,
    #[serde(default)]
    before: Vec<RawStep>,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    after: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    keyword: String,
    #[serde(default)]
    name: String,
    result: Option<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    status: String,
    duration: Option<f64>,
    error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CucumberStep {
    pub text: String,
    pub status: TestStatus,
    /// Raw status as written by the runner (e.g. "undefined")
    pub raw_status: String,
    pub duration_secs: Option<f64>,
    pub error_message: Option<String>,
    /// Hook steps are not shown as Gherkin steps
    pub is_hook: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CucumberScenario {
    pub name: String,
    pub keyword: String,
    pub is_background: bool,
    pub steps: Vec<CucumberStep>,
}

impl CucumberScenario {
    pub fn status(&self) -> TestStatus {
        TestStatus::rollup(self.steps.iter().map(|s| s.status))
    }

    fn duration_secs(&self) -> Option<f64> {
        let times: Vec<f64> = self.steps.iter().filter_map(|s| s.duration_secs).collect();
        if times.is_empty() {
            None
        } else {
            Some(times.iter().sum())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CucumberFeature {
    pub name: String,
    pub uri: String,
    pub scenarios: Vec<CucumberScenario>,
}

impl CucumberFeature {
    /// Scenarios that count as tests (backgrounds excluded).
    pub fn test_scenarios(&self) -> impl Iterator<Item = &CucumberScenario> {
        self.scenarios.iter().filter(|s| !s.is_background)
    }

    pub fn status(&self) -> TestStatus {
        TestStatus::rollup(self.test_scenarios().map(|s| s.status()))
    }

    fn duration_secs(&self) -> Option<f64> {
        let times: Vec<f64> = self.scenarios.iter().filter_map(|s| s.duration_secs()).collect();
        if times.is_empty() {
            None
        } else {
            Some(times.iter().sum())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CucumberReport {
    pub features: Vec<CucumberFeature>,
}

impl CucumberReport {
    /// Cucumber carries no summary block; scenarios are counted.
    pub fn stats(&self) -> TestStats {
        let stats = TestStats::from_outcomes(
            self.features
                .iter()
                .flat_map(|f| f.test_scenarios().map(|s| s.status())),
        );
        let times: Vec<f64> = self.features.iter().filter_map(|f| f.duration_secs()).collect();
        let duration = if times.is_empty() {
            None
        } else {
            Some(times.iter().sum())
        };
        stats.with_duration(duration)
    }
}

fn map_status(status: &str) -> TestStatus {
    match status {
        "passed" => TestStatus::Passed,
        "failed" | "ambiguous" => TestStatus::Failed,
        // skipped, pending, undefined, unknown
        _ => TestStatus::Skipped,
    }
}

fn convert_step(step: RawStep, is_hook: bool) -> CucumberStep {
    let (raw_status, duration, error_message) = match step.result {
        Some(r) => (r.status, r.duration, r.error_message),
        None => ("skipped".to_string(), None, None),
    };
    CucumberStep {
        text: format!("{}{}", step.keyword, step.name).trim().to_string(),
        status: map_status(&raw_status),
        raw_status,
        duration_secs: duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d * DURATION_TO_SECS),
        error_message,
        is_hook,
    }
}

/// Parse a Cucumber JSON report (a top-level array of features).
pub fn parse(payload: &str) -> ReportResult<CucumberReport> {
    let raw: Vec<RawFeature> =
        serde_json::from_str(payload).map_err(|e| ReportError::parse("Cucumber", e))?;

    let features = raw
        .into_iter()
        .map(|feature| CucumberFeature {
            name: feature.name,
            uri: feature.uri,
            scenarios: feature
                .elements
                .into_iter()
                .map(|element| {
                    let mut steps = Vec::new();
                    steps.extend(element.before.into_iter().map(|s| convert_step(s, true)));
                    steps.extend(element.steps.into_iter().map(|s| convert_step(s, false)));
                    steps.extend(element.after.into_iter().map(|s| convert_step(s, true)));
                    CucumberScenario {
                        name: element.name,
                        is_background: element.kind == "background",
                        keyword: element.keyword,
                        steps,
                    }
                })
                .collect(),
        })
        .collect();

    Ok(CucumberReport { features })
}

/// Render features, then scenarios with their steps.
pub fn render(report: &CucumberReport) -> String {
    let mut out = String::from("<h2>Features</h2>\n");
    if report.features.is_empty() {
        out.push_str("<div class=\"empty\">No features in this report</div>\n");
        return out;
    }
    for feature in &report.features {
        let status = feature.status();
        out.push_str(&format!(
            "<details{open}>\n<summary><span class=\"{class}\">{label}</span> {name} <span class=\"mono\">{uri}</span> &middot; {count} scenario(s) &middot; {duration}</summary>\n",
            open = if status == TestStatus::Failed { " open" } else { "" },
            class = test_status_class(status),
            label = status.label(),
            name = html_escape(&feature.name),
            uri = html_escape(&feature.uri),
            count = feature.test_scenarios().count(),
            duration = fmt_duration(feature.duration_secs()),
        ));
        for scenario in &feature.scenarios {
            let status = scenario.status();
            out.push_str(&format!(
                "<details>\n<summary><span class=\"{}\">{}</span> {}: {}</summary>\n<table>\n<tr><th>Step</th><th>Status</th><th class=\"num\">Duration</th></tr>\n",
                test_status_class(status),
                status.label(),
                html_escape(&scenario.keyword),
                html_escape(&scenario.name),
            ));
            for step in scenario.steps.iter().filter(|s| !s.is_hook || s.status == TestStatus::Failed) {
                let text = if step.is_hook {
                    "(hook)".to_string()
                } else {
                    html_escape(&step.text)
                };
                out.push_str(&format!(
                    "<tr><td>{}</td><td class=\"{}\">{}</td><td class=\"num\">{}</td></tr>\n",
                    text,
                    test_status_class(step.status),
                    html_escape(&step.raw_status),
                    fmt_duration(step.duration_secs),
                ));
                if let Some(message) = &step.error_message {
                    out.push_str(&format!(
                        "<tr><td colspan=\"3\"><pre>{}</pre></td></tr>\n",
                        html_escape(message)
                    ));
                }
            }
            out.push_str("</table>\n</details>\n");
        }
        out.push_str("</details>\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(name: &str, statuses: &[&str]) -> String {
        let steps: Vec<String> = statuses
            .iter()
            .map(|s| {
                format!(
                    r#"{{"keyword":"Given ","name":"step","result":{{"status":"{s}","duration":250000000}}}}"#
                )
            })
            .collect();
        format!(
            r#"{{"name":"{name}","type":"scenario","keyword":"Scenario","steps":[{}]}}"#,
            steps.join(",")
        )
    }

    fn sample() -> String {
        let mut scenarios = Vec::new();
        for i in 0..8 {
            scenarios.push(scenario(&format!("ok {i}"), &["passed", "passed"]));
        }
        scenarios.push(scenario("broken", &["passed", "failed", "skipped"]));
        scenarios.push(scenario("wip", &["passed", "pending"]));
        format!(
            r#"[{{"uri":"features/login.feature","name":"Login","keyword":"Feature","elements":[{{"type":"background","keyword":"Background","name":"","steps":[{{"keyword":"Given ","name":"a user","result":{{"status":"passed","duration":1000000000}}}}]}},{}]}}]"#,
            scenarios.join(",")
        )
    }

    #[test]
    fn test_counts_scenarios_not_steps() {
        let stats = parse(&sample()).unwrap().stats();
        assert_eq!(
            (stats.total, stats.passed, stats.failed, stats.skipped),
            (10, 8, 1, 1)
        );
        // background 1s + 21 steps * 0.25s
        assert_eq!(stats.duration, Some(6.25));
    }

    #[test]
    fn test_scenario_and_feature_rollup() {
        let report = parse(&sample()).unwrap();
        let feature = &report.features[0];
        assert_eq!(feature.status(), TestStatus::Failed);
        let broken = feature.scenarios.iter().find(|s| s.name == "broken").unwrap();
        assert_eq!(broken.status(), TestStatus::Failed);
        let wip = feature.scenarios.iter().find(|s| s.name == "wip").unwrap();
        assert_eq!(wip.status(), TestStatus::Skipped);
    }

    #[test]
    fn test_undefined_and_ambiguous() {
        let json = format!(
            "[{{\"name\":\"f\",\"elements\":[{},{}]}}]",
            scenario("u", &["passed", "undefined"]),
            scenario("a", &["ambiguous"])
        );
        let stats = parse(&json).unwrap().stats();
        assert_eq!((stats.failed, stats.skipped), (1, 1));
    }

    #[test]
    fn test_failed_hook_fails_scenario() {
        let json = r#"[{"name":"f","elements":[{"name":"s","type":"scenario","keyword":"Scenario",
            "before":[{"keyword":"Before","result":{"status":"failed","error_message":"db down"}}],
            "steps":[{"keyword":"Given ","name":"x","result":{"status":"skipped"}}]}]}]"#;
        let report = parse(json).unwrap();
        assert_eq!(report.stats().failed, 1);
        let html = render(&report);
        assert!(html.contains("(hook)"));
        assert!(html.contains("db down"));
    }

    #[test]
    fn test_empty_array_is_valid() {
        let stats = parse("[]").unwrap().stats();
        assert_eq!(stats, TestStats::default());
    }

    #[test]
    fn test_object_is_error() {
        assert!(parse("{\"numTotalTests\":1}").is_err());
    }
}
