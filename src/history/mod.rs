//! History over published runs: retention and index generation.
//!
//! Everything here derives from `RunRecord`/`RunMetadata` values loaded from
//! the sidecars; the rendered pages are never read back.

pub mod home_md;
pub mod index;
pub mod index_html;
pub mod retention;

pub use home_md::render_home_markdown;
pub use index::{
    BranchRuns, DEFAULT_MAX_RECENT_RUNS, DEFAULT_MAX_RUNS_PER_BRANCH, IndexDocuments,
    IndexGenerator, IndexOptions, WikiIndex,
};
pub use index_html::{NO_REPORTS_MARKER, render_branch_index, render_global_index};
pub use retention::{DEFAULT_MAX_REPORTS_PER_BRANCH, RetentionPlan, RetentionPolicy};
