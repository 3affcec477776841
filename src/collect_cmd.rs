//! CLI command handler for `collect`.
//!
//! Lists the report artifacts found in a repository tree.

use std::path::PathBuf;

use crate::ReportResult;
use crate::collect::Collector;
use crate::config::WikiConfig;

pub fn run(
    config: &WikiConfig,
    root: PathBuf,
    patterns: Vec<String>,
    excludes: Vec<String>,
    packages: Vec<PathBuf>,
    json: bool,
) -> ReportResult<()> {
    let options = config.collect.options(&patterns, &excludes, &packages);
    let reports = Collector::new(&root).collect(&options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("No report artifacts found under {}", root.display());
        return Ok(());
    }
    for package in &reports {
        println!("{} ({})", package.package_name, package.package_path.display());
        for artifact in &package.artifacts {
            println!(
                "  {:<9} {:>9} B  {}",
                artifact.format.slug(),
                artifact.size,
                artifact.relative_path
            );
        }
    }
    Ok(())
}
