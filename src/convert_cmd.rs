//! CLI command handler for `convert`: one raw report to one HTML page.

use std::path::PathBuf;

use crate::formats::{ReportFormat, RenderContext, detect_path};
use crate::{ReportError, ReportResult, now_string};

pub fn run(
    input: PathBuf,
    format: Option<String>,
    output: PathBuf,
    json: bool,
) -> ReportResult<()> {
    let format = match format {
        Some(slug) => ReportFormat::from_slug(&slug)
            .ok_or_else(|| ReportError::Message(format!("unknown report format: {slug}")))?,
        None => detect_path(&input),
    };
    let converter = format.converter().ok_or_else(|| {
        ReportError::Message(format!(
            "could not detect the report format of {}; pass --format",
            input.display()
        ))
    })?;

    let bytes = std::fs::read(&input)
        .map_err(|e| ReportError::io(format!("failed to read {}", input.display()), e))?;
    let payload = String::from_utf8_lossy(&bytes);
    let title = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let result = converter.convert(&payload, &RenderContext::new(title, now_string()));

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ReportError::io(format!("failed to create {}", parent.display()), e))?;
    }
    std::fs::write(&output, &result.html)
        .map_err(|e| ReportError::io(format!("failed to write {}", output.display()), e))?;

    if json {
        let summary = serde_json::json!({
            "format": result.format,
            "output": output.display().to_string(),
            "stats": result.stats,
            "parseError": result.parse_error,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        eprintln!(
            "{} report: {} total, {} passed, {} failed, {} skipped",
            format.label(),
            result.stats.total,
            result.stats.passed,
            result.stats.failed,
            result.stats.skipped
        );
        if let Some(err) = &result.parse_error {
            eprintln!("warning: {err}");
        }
        eprintln!("Wrote {}", output.display());
    }
    Ok(())
}
