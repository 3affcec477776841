//! Normalized test statistics shared by every report format.

use serde::{Deserialize, Serialize};

/// Round a floating point value to 3 decimal places for deterministic output.
pub fn round_to_3dp(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Outcome of a single test, scenario, suite or feature.
///
/// Pending, todo and undefined outcomes are folded into `Skipped` so counts
/// stay comparable across formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    /// Roll child outcomes up into a parent outcome.
    ///
    /// Any failed child fails the parent; otherwise any skipped child skips
    /// it; otherwise (including no children at all) the parent passed.
    pub fn rollup<I>(children: I) -> TestStatus
    where
        I: IntoIterator<Item = TestStatus>,
    {
        let mut status = TestStatus::Passed;
        for child in children {
            match child {
                TestStatus::Failed => return TestStatus::Failed,
                TestStatus::Skipped => status = TestStatus::Skipped,
                TestStatus::Passed => {}
            }
        }
        status
    }

    pub fn label(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
        }
    }
}

/// Coverage percentages passed through from an upstream coverage summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub lines: f64,
    pub branches: f64,
    pub functions: f64,
    pub statements: f64,
}

/// One `{ total, covered, pct }` block of an istanbul summary.
#[derive(Debug, Clone, Copy, Default)]
struct IstanbulMetric {
    total: f64,
    covered: f64,
    pct: Option<f64>,
}

impl IstanbulMetric {
    fn read(total: &serde_json::Value, key: &str) -> IstanbulMetric {
        let block = &total[key];
        IstanbulMetric {
            total: block["total"].as_f64().unwrap_or(0.0),
            covered: block["covered"].as_f64().unwrap_or(0.0),
            // istanbul writes "Unknown" as pct when total is zero
            pct: block["pct"].as_f64(),
        }
    }

    fn percentage(&self) -> f64 {
        match self.pct {
            Some(pct) => pct,
            None if self.total > 0.0 => self.covered / self.total * 100.0,
            None => 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IstanbulTotals {
    lines: IstanbulMetric,
    branches: IstanbulMetric,
    functions: IstanbulMetric,
    statements: IstanbulMetric,
}

impl IstanbulTotals {
    fn parse(payload: &str) -> Option<IstanbulTotals> {
        let value: serde_json::Value = serde_json::from_str(payload).ok()?;
        let total = value.get("total").filter(|t| t.is_object())?;
        Some(IstanbulTotals {
            lines: IstanbulMetric::read(total, "lines"),
            branches: IstanbulMetric::read(total, "branches"),
            functions: IstanbulMetric::read(total, "functions"),
            statements: IstanbulMetric::read(total, "statements"),
        })
    }

    fn coverage(&self) -> Coverage {
        Coverage {
            lines: round_to_3dp(self.lines.percentage()),
            branches: round_to_3dp(self.branches.percentage()),
            functions: round_to_3dp(self.functions.percentage()),
            statements: round_to_3dp(self.statements.percentage()),
        }
    }
}

impl Coverage {
    /// Read the `total` block of an istanbul `coverage-summary.json`.
    ///
    /// Returns `None` when the payload is not a coverage summary.
    pub fn from_istanbul_summary(payload: &str) -> Option<Coverage> {
        IstanbulTotals::parse(payload).map(|t| t.coverage())
    }

    /// Combine several istanbul summaries by summing their covered/total counts.
    ///
    /// Summaries that do not parse are ignored. Returns `None` if none parse.
    pub fn combine_istanbul_summaries<'a, I>(payloads: I) -> Option<Coverage>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let parsed: Vec<IstanbulTotals> = payloads
            .into_iter()
            .filter_map(IstanbulTotals::parse)
            .collect();
        match parsed.as_slice() {
            [] => None,
            [single] => Some(single.coverage()),
            many => {
                let pick = |f: fn(&IstanbulTotals) -> IstanbulMetric| {
                    let (covered, total) = many
                        .iter()
                        .map(f)
                        .fold((0.0, 0.0), |acc, m| (acc.0 + m.covered, acc.1 + m.total));
                    if total > 0.0 {
                        round_to_3dp(covered / total * 100.0)
                    } else {
                        100.0
                    }
                };
                Some(Coverage {
                    lines: pick(|t| t.lines),
                    branches: pick(|t| t.branches),
                    functions: pick(|t| t.functions),
                    statements: pick(|t| t.statements),
                })
            }
        }
    }
}

/// Normalized counts for one report or one aggregated run.
///
/// `total == passed + failed + skipped` holds for every value built through
/// the constructors in this module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestStats {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Coverage>,
}

impl TestStats {
    /// Build stats from source-reported counts.
    ///
    /// A source-supplied `total` wins over recomputation: `passed` is derived
    /// as the remainder. When `failed + skipped` exceeds the supplied total,
    /// the total is raised so the counts stay consistent.
    pub fn from_counts(total: Option<u64>, failed: u64, skipped: u64) -> TestStats {
        let not_passed = failed.saturating_add(skipped);
        let total = total.unwrap_or(not_passed).max(not_passed);
        TestStats {
            total,
            passed: total - not_passed,
            failed,
            skipped,
            duration: None,
            coverage: None,
        }
    }

    /// Count leaf outcomes.
    pub fn from_outcomes<I>(outcomes: I) -> TestStats
    where
        I: IntoIterator<Item = TestStatus>,
    {
        let mut stats = TestStats::default();
        for outcome in outcomes {
            stats.total += 1;
            match outcome {
                TestStatus::Passed => stats.passed += 1,
                TestStatus::Failed => stats.failed += 1,
                TestStatus::Skipped => stats.skipped += 1,
            }
        }
        stats
    }

    pub fn with_duration(mut self, duration_secs: Option<f64>) -> TestStats {
        self.duration = duration_secs.map(round_to_3dp);
        self
    }

    /// Add another result's counts and duration into this one.
    ///
    /// Coverage is left untouched; percentages cannot be summed.
    pub fn merge(&mut self, other: &TestStats) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.duration = match (self.duration, other.duration) {
            (Some(a), Some(b)) => Some(round_to_3dp(a + b)),
            (a, b) => a.or(b),
        };
    }

    /// Sum a sequence of stats.
    pub fn aggregate<'a, I>(items: I) -> TestStats
    where
        I: IntoIterator<Item = &'a TestStats>,
    {
        let mut sum = TestStats::default();
        for item in items {
            sum.merge(item);
        }
        sum
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.passed + self.failed + self.skipped
    }

    /// Pass rate in percent, `None` when nothing ran.
    pub fn pass_rate(&self) -> Option<f64> {
        let executed = self.passed + self.failed;
        if executed == 0 {
            None
        } else {
            Some(round_to_3dp(self.passed as f64 / executed as f64 * 100.0))
        }
    }

    pub fn status(&self) -> TestStatus {
        if self.failed > 0 {
            TestStatus::Failed
        } else if self.total > 0 && self.passed == 0 {
            TestStatus::Skipped
        } else {
            TestStatus::Passed
        }
    }
}
