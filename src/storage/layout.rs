//! Paths inside the report store.
//!
//! ```text
//! <root>/Home.md
//! <root>/reports/index.html
//! <root>/reports/<branch>/index.html
//! <root>/reports/<branch>/<run_id>/{index.html, <format>.html, metadata.json}
//! ```
//!
//! Branch names and run ids become single path segments; see
//! [`sanitize_segment`].

use std::path::{Path, PathBuf};

pub const REPORTS_DIR: &str = "reports";
pub const INDEX_FILE: &str = "index.html";
pub const METADATA_FILE: &str = "metadata.json";
pub const HOME_FILE: &str = "Home.md";

/// Turn an arbitrary name into one safe directory segment.
///
/// ASCII alphanumerics, `-`, `_` and `.` are kept; everything else becomes
/// `-`. Empty results and the relative names `.`/`..` become `_`. Whenever
/// the result differs from `raw`, the first 8 hex digits of the SHA-256 of
/// `raw` are appended, so `feature/x` and `feature-x` get distinct
/// directories (`feature-x-217d2bf5` and `feature-x`). The unsanitized name
/// is kept in the run's sidecar.
pub fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    };
    if cleaned == raw {
        return cleaned;
    }
    let digest = sha256::digest(raw);
    format!("{}-{}", cleaned, &digest[..SEGMENT_HASH_LEN])
}

const SEGMENT_HASH_LEN: usize = 8;

/// Run location relative to `reports/`, e.g. `main/42`.
pub fn run_segment_path(branch: &str, run_id: &str) -> String {
    format!("{}/{}", sanitize_segment(branch), sanitize_segment(run_id))
}

#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        StoreLayout {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    pub fn global_index(&self) -> PathBuf {
        self.reports_dir().join(INDEX_FILE)
    }

    pub fn home_page(&self) -> PathBuf {
        self.root.join(HOME_FILE)
    }

    pub fn branch_dir(&self, branch: &str) -> PathBuf {
        self.reports_dir().join(sanitize_segment(branch))
    }

    pub fn branch_index(&self, branch: &str) -> PathBuf {
        self.branch_dir(branch).join(INDEX_FILE)
    }

    pub fn run_dir(&self, branch: &str, run_id: &str) -> PathBuf {
        self.branch_dir(branch).join(sanitize_segment(run_id))
    }

    pub fn run_metadata(&self, branch: &str, run_id: &str) -> PathBuf {
        self.run_dir(branch, run_id).join(METADATA_FILE)
    }

    /// Run directory relative to the store root, always `/`-separated.
    pub fn run_report_path(branch: &str, run_id: &str) -> String {
        format!("{}/{}", REPORTS_DIR, run_segment_path(branch, run_id))
    }
}
