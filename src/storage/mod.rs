//! Storage layer for the report store.
//!
//! The on-disk tree is the single source of truth; indexes are always
//! derived from the sidecars found here.

pub mod atomic;
pub mod layout;
pub mod metadata;

// Re-export key types
pub use atomic::write_atomic;
pub use layout::{
    HOME_FILE, INDEX_FILE, METADATA_FILE, REPORTS_DIR, StoreLayout, run_segment_path,
    sanitize_segment,
};
pub use metadata::{StoredRun, count_files, load_all, read_metadata, write_metadata};
