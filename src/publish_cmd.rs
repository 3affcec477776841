//! CLI command handler for `publish`.
//!
//! Publishes one run into the local store, then hands the store to the
//! configured remote if publishing succeeded. By default failures are
//! reported but do not fail the process; `--fail-on-error` makes them fatal.

use std::path::PathBuf;

use crate::config::WikiConfig;
use crate::publish::{PublishRequest, Publisher, remote_for};
use crate::{ReportResult, now_string};

#[derive(Debug, Clone)]
pub struct PublishArgs {
    pub branch: String,
    pub run_id: String,
    pub commit: String,
    pub timestamp: Option<String>,
    pub reports: PathBuf,
    pub store: Option<PathBuf>,
    pub max_per_branch: Option<usize>,
    pub max_recent: Option<usize>,
    pub fail_on_error: bool,
    pub push_command: Option<String>,
}

pub fn run(config: &WikiConfig, args: PublishArgs) -> ReportResult<()> {
    let store = args.store.unwrap_or_else(|| config.store.root.clone());
    let fail_on_error = args.fail_on_error || config.publish.fail_on_error;

    let mut request = PublishRequest::new(
        &args.branch,
        &args.run_id,
        &args.commit,
        args.timestamp.unwrap_or_else(now_string),
        &args.reports,
    );
    request.max_reports_per_branch = args
        .max_per_branch
        .unwrap_or(config.retention.max_reports_per_branch);
    request.max_recent_runs = args.max_recent.unwrap_or(config.index.max_recent_runs);
    request.max_runs_per_branch = config.index.max_runs_per_branch;
    request.fail_on_error = fail_on_error;

    let publisher = Publisher::new(&store);
    let outcome = publisher.publish(&request);

    if outcome.success {
        eprintln!(
            "Published {} ({}): {} file(s) written, {} file(s) removed by retention",
            outcome.report_path,
            outcome.status.map(|s| s.label()).unwrap_or("unknown"),
            outcome.files_published,
            outcome.files_deleted
        );
    } else {
        eprintln!(
            "warning: publish of {} failed during {}: {}",
            outcome.report_path,
            outcome
                .failed_stage
                .map(|s| s.label())
                .unwrap_or("unknown stage"),
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    if outcome.success {
        let push_command = args.push_command.or_else(|| config.publish.push_command.clone());
        let remote = remote_for(push_command.as_deref());
        let message = format!(
            "Publish test reports for {} run {} ({})",
            args.branch, args.run_id, args.commit
        );
        tracing::debug!(remote = %remote.describe(), "pushing store");
        if let Err(e) = remote.push(&store, &message) {
            tracing::warn!("remote push failed: {e}");
            if fail_on_error {
                return Err(e);
            }
        }
    }

    outcome.into_result(fail_on_error).map(|_| ())
}
