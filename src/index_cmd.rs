//! CLI command handler for `index`.
//!
//! Rebuilds every index page from the sidecars in the store, e.g. after an
//! interrupted publish.

use std::path::PathBuf;

use crate::config::WikiConfig;
use crate::history::IndexOptions;
use crate::publish::Publisher;
use crate::{ReportResult, now_string};

pub fn run(
    config: &WikiConfig,
    store: Option<PathBuf>,
    max_recent: Option<usize>,
    max_per_branch: Option<usize>,
) -> ReportResult<()> {
    let store = store.unwrap_or_else(|| config.store.root.clone());
    let options = IndexOptions {
        max_recent_runs: max_recent.unwrap_or(config.index.max_recent_runs),
        max_runs_per_branch: max_per_branch.unwrap_or(config.index.max_runs_per_branch),
        generated_at: now_string(),
    };

    let write = Publisher::new(&store).regenerate_index(&options)?;
    eprintln!(
        "Indexed {} run(s) in {}: {} file(s) written, {} stale page(s) removed",
        write.runs_indexed,
        store.display(),
        write.files_written,
        write.files_deleted
    );
    Ok(())
}
