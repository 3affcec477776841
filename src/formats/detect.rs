//! Format detection from file names and sampled content.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::ReportFormat;

/// Number of leading bytes sampled when the file name is inconclusive.
pub const SAMPLE_BYTES: usize = 1000;

fn name_markers(format: ReportFormat) -> &'static [&'static str] {
    match format {
        ReportFormat::Junit => &["junit", "surefire", "test-"],
        ReportFormat::Jest => &["jest"],
        ReportFormat::Vitest => &["vitest"],
        ReportFormat::Cucumber => &["cucumber"],
        ReportFormat::Unknown => &[],
    }
}

fn expected_extension(format: ReportFormat) -> &'static str {
    match format {
        ReportFormat::Junit => ".xml",
        _ => ".json",
    }
}

fn content_matches(format: ReportFormat, sample: &str) -> bool {
    match format {
        ReportFormat::Junit => sample.contains("<testsuites") || sample.contains("<testsuite"),
        ReportFormat::Jest | ReportFormat::Vitest => sample.contains("\"numTotalTests\""),
        ReportFormat::Cucumber => {
            sample.contains("\"elements\"")
                && (sample.contains("\"keyword\"") || sample.contains("\"uri\""))
        }
        ReportFormat::Unknown => false,
    }
}

/// Classify by file name alone.
fn detect_by_name(path: &Path) -> Option<ReportFormat> {
    let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
    ReportFormat::PRIORITY.into_iter().find(|format| {
        name.ends_with(expected_extension(*format))
            && name_markers(*format).iter().any(|m| name.contains(m))
    })
}

/// Classify by sampled content alone.
fn detect_by_content(sample: &str) -> Option<ReportFormat> {
    let sample = truncate_to_boundary(sample, SAMPLE_BYTES);
    ReportFormat::PRIORITY
        .into_iter()
        .find(|format| content_matches(*format, sample))
}

fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn read_sample(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut buf = Vec::with_capacity(SAMPLE_BYTES);
    file.take(SAMPLE_BYTES as u64).read_to_end(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Classify a report file.
///
/// The file name is checked first; if it is inconclusive the content sample
/// is inspected, reading the first `SAMPLE_BYTES` from disk when no sample is
/// supplied. Never fails: unreadable or unrecognised files are `Unknown`.
pub fn detect(path: &Path, sample: Option<&str>) -> ReportFormat {
    if let Some(format) = detect_by_name(path) {
        return format;
    }
    let sampled;
    let sample = match sample {
        Some(s) => s,
        None => match read_sample(path) {
            Some(s) => {
                sampled = s;
                sampled.as_str()
            }
            None => return ReportFormat::Unknown,
        },
    };
    detect_by_content(sample).unwrap_or(ReportFormat::Unknown)
}

/// Classify a file on disk.
pub fn detect_path(path: &Path) -> ReportFormat {
    detect(path, None)
}
