//! Core types for report-wiki.
//!
//! `TestStats` is the normalized model every converter produces; `RunRecord`
//! and `RunMetadata` describe published runs.

pub mod schema;
pub mod stats;

// Re-export key types for convenience
pub use schema::{
    METADATA_SCHEMA_VERSION, ReportEntry, RunMetadata, RunRecord, RunStatus,
    compare_newest_first, parse_timestamp, sort_metadata_newest_first, sort_newest_first,
};
pub use stats::{Coverage, TestStats, TestStatus, round_to_3dp};
