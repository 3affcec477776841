//! Report formats: detection and conversion.
//!
//! The set of formats is closed. `detect` classifies a file, and every known
//! format maps to a `Converter` variant that parses a raw payload into
//! `TestStats` and renders a self-contained HTML page.

pub mod cucumber;
pub mod detect;
pub mod jest;
pub mod junit;

use serde::{Deserialize, Serialize};

use crate::core::TestStats;
use crate::html::{html_escape, render_page, render_parse_failure, render_stats_cards};

pub use detect::{SAMPLE_BYTES, detect, detect_path};

/// Known report formats plus `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Junit,
    Jest,
    Vitest,
    Cucumber,
    Unknown,
}

impl ReportFormat {
    /// Detection priority; ties resolve to the earliest entry.
    pub const PRIORITY: [ReportFormat; 4] = [
        ReportFormat::Junit,
        ReportFormat::Jest,
        ReportFormat::Vitest,
        ReportFormat::Cucumber,
    ];

    /// File stem used for the rendered page (e.g. "junit" -> junit.html).
    pub fn slug(&self) -> &'static str {
        match self {
            ReportFormat::Junit => "junit",
            ReportFormat::Jest => "jest",
            ReportFormat::Vitest => "vitest",
            ReportFormat::Cucumber => "cucumber",
            ReportFormat::Unknown => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportFormat::Junit => "JUnit",
            ReportFormat::Jest => "Jest",
            ReportFormat::Vitest => "Vitest",
            ReportFormat::Cucumber => "Cucumber",
            ReportFormat::Unknown => "Unknown",
        }
    }

    pub fn from_slug(slug: &str) -> Option<ReportFormat> {
        match slug.to_ascii_lowercase().as_str() {
            "junit" => Some(ReportFormat::Junit),
            "jest" => Some(ReportFormat::Jest),
            "vitest" => Some(ReportFormat::Vitest),
            "cucumber" => Some(ReportFormat::Cucumber),
            _ => None,
        }
    }

    pub fn converter(&self) -> Option<Converter> {
        match self {
            ReportFormat::Junit => Some(Converter::Junit),
            ReportFormat::Jest => Some(Converter::Jest),
            ReportFormat::Vitest => Some(Converter::Vitest),
            ReportFormat::Cucumber => Some(Converter::Cucumber),
            ReportFormat::Unknown => None,
        }
    }
}

/// Inputs a converter needs besides the payload itself.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Page heading, usually the artifact name
    pub title: String,
    /// The only time-dependent value a page may contain
    pub generated_at: String,
}

impl RenderContext {
    pub fn new(title: impl Into<String>, generated_at: impl Into<String>) -> Self {
        RenderContext {
            title: title.into(),
            generated_at: generated_at.into(),
        }
    }
}

/// Output of converting one raw artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub format: ReportFormat,
    pub html: String,
    pub stats: TestStats,
    /// Set when the payload could not be parsed; stats are zeroed then
    pub parse_error: Option<String>,
}

/// One variant per convertible format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    Junit,
    Jest,
    Vitest,
    Cucumber,
}

impl Converter {
    pub fn format(&self) -> ReportFormat {
        match self {
            Converter::Junit => ReportFormat::Junit,
            Converter::Jest => ReportFormat::Jest,
            Converter::Vitest => ReportFormat::Vitest,
            Converter::Cucumber => ReportFormat::Cucumber,
        }
    }

    /// Convert a raw payload. Never fails: a payload that cannot be parsed
    /// yields zeroed stats and a page carrying the parse error.
    pub fn convert(&self, payload: &str, ctx: &RenderContext) -> ConversionResult {
        let format = self.format();
        let parsed = match self {
            Converter::Junit => junit::parse(payload).map(|r| (r.stats(), junit::render(&r))),
            Converter::Jest | Converter::Vitest => {
                jest::parse(payload, format.label()).map(|r| (r.stats(), jest::render(&r)))
            }
            Converter::Cucumber => {
                cucumber::parse(payload).map(|r| (r.stats(), cucumber::render(&r)))
            }
        };
        match parsed {
            Ok((stats, body)) => ConversionResult {
                format,
                html: render_report_page(format, ctx, &stats, &body),
                stats,
                parse_error: None,
            },
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(format = format.slug(), title = %ctx.title, "report parse failed: {message}");
                let stats = TestStats::default();
                let body = render_parse_failure(format.label(), &message);
                ConversionResult {
                    format,
                    html: render_report_page(format, ctx, &stats, &body),
                    stats,
                    parse_error: Some(message),
                }
            }
        }
    }
}

fn render_report_page(
    format: ReportFormat,
    ctx: &RenderContext,
    stats: &TestStats,
    body: &str,
) -> String {
    let header = format!(
        "<h1>{}</h1>\n<div class=\"meta\">{} report</div>\n",
        html_escape(&ctx.title),
        format.label()
    );
    let body = format!("<h2>Summary</h2>\n{}{}", render_stats_cards(stats), body);
    render_page(
        &format!("{} - {}", ctx.title, format.label()),
        &header,
        &body,
        &ctx.generated_at,
    )
}
