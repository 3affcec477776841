//! Discovery of raw report artifacts in a (mono)repo tree.
//!
//! The tree is walked once per walk root with sorted directory listings, so
//! the discovery order is deterministic. Missing directories are skipped and
//! symbolic links are never followed.

pub mod patterns;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::ReportResult;
use crate::formats::{ReportFormat, detect_path};

pub use patterns::{DEFAULT_EXCLUDE_PATTERNS, DEFAULT_PATTERNS, matches_any, matches_glob};

/// Package name for artifacts outside `packages/` and `apps/`.
pub const ROOT_PACKAGE: &str = "root";

/// Directories that each hold one package per child directory.
const PACKAGE_CONTAINERS: &[&str] = &["packages", "apps"];

/// Report directories scanned at the repository root.
const ROOT_REPORT_DIRS: &[&str] = &["test-results", "reports", "coverage"];

#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Include globs, matched against paths relative to the collection root
    pub patterns: Vec<String>,
    /// Exclude globs; matching directories are not descended into
    pub exclude_patterns: Vec<String>,
    /// Package directories (relative to the root) to walk instead of the
    /// conventional ones. An empty path walks the root itself.
    pub explicit_packages: Vec<PathBuf>,
}

impl Default for CollectOptions {
    fn default() -> Self {
        CollectOptions {
            patterns: DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            explicit_packages: Vec::new(),
        }
    }
}

impl CollectOptions {
    /// Every file below the root, default excludes applied.
    pub fn all_files() -> Self {
        CollectOptions {
            patterns: vec!["**/*".to_string()],
            explicit_packages: vec![PathBuf::new()],
            ..CollectOptions::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    /// `/`-separated path relative to the collection root
    pub relative_path: String,
    pub format: ReportFormat,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageReports {
    pub package_name: String,
    pub package_path: PathBuf,
    /// In discovery order
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone)]
pub struct Collector {
    root: PathBuf,
}

impl Collector {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Collector {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk_roots(&self, options: &CollectOptions) -> Vec<PathBuf> {
        if !options.explicit_packages.is_empty() {
            return options
                .explicit_packages
                .iter()
                .map(|p| self.root.join(p))
                .collect();
        }
        PACKAGE_CONTAINERS
            .iter()
            .chain(ROOT_REPORT_DIRS)
            .map(|d| self.root.join(d))
            .collect()
    }

    /// Collect artifacts grouped by owning package, sorted by package name.
    ///
    /// # Errors
    /// Only unexpected I/O failures inside existing directories are errors;
    /// absent directories contribute nothing.
    pub fn collect(&self, options: &CollectOptions) -> ReportResult<Vec<PackageReports>> {
        let mut files = Vec::new();
        let mut seen = HashSet::new();
        for walk_root in self.walk_roots(options) {
            if !walk_root.is_dir() {
                tracing::debug!(path = %walk_root.display(), "skipping missing directory");
                continue;
            }
            let rel = self.relative(&walk_root);
            if !rel.is_empty() && matches_any(&options.exclude_patterns, &rel) {
                tracing::debug!(path = %rel, "walk root excluded");
                continue;
            }
            self.walk(&walk_root, options, &mut seen, &mut files)?;
        }

        let mut packages: BTreeMap<String, PackageReports> = BTreeMap::new();
        for (path, relative_path) in files {
            let (package_name, package_path) = owning_package(&relative_path);
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let artifact = Artifact {
                format: detect_path(&path),
                path,
                relative_path,
                size,
            };
            packages
                .entry(package_name.clone())
                .or_insert_with(|| PackageReports {
                    package_name,
                    package_path: self.root.join(package_path),
                    artifacts: Vec::new(),
                })
                .artifacts
                .push(artifact);
        }

        let packages: Vec<PackageReports> = packages.into_values().collect();
        tracing::info!(
            root = %self.root.display(),
            packages = packages.len(),
            artifacts = packages.iter().map(|p| p.artifacts.len()).sum::<usize>(),
            "collected report artifacts"
        );
        Ok(packages)
    }

    fn walk(
        &self,
        walk_root: &Path,
        options: &CollectOptions,
        seen: &mut HashSet<String>,
        out: &mut Vec<(PathBuf, String)>,
    ) -> ReportResult<()> {
        let walker = WalkDir::new(walk_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !matches_any(&options.exclude_patterns, &self.relative(e.path()))
            });
        for entry in walker {
            let entry = entry?;
            // symlinks are neither descended into nor collected
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = self.relative(entry.path());
            if matches_any(&options.patterns, &rel) && seen.insert(rel.clone()) {
                out.push((entry.into_path(), rel));
            }
        }
        Ok(())
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// First `packages/<name>` or `apps/<name>` ancestor, else the root package.
fn owning_package(relative_path: &str) -> (String, String) {
    let segments: Vec<&str> = relative_path.split('/').collect();
    // the last segment is the file itself
    let dirs = &segments[..segments.len().saturating_sub(1)];
    for (i, window) in dirs.windows(2).enumerate() {
        if PACKAGE_CONTAINERS.contains(&window[0]) {
            let package_path = dirs[..=i + 1].join("/");
            return (window[1].to_string(), package_path);
        }
    }
    (ROOT_PACKAGE.to_string(), String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owning_package() {
        assert_eq!(
            owning_package("packages/web/junit.xml"),
            ("web".to_string(), "packages/web".to_string())
        );
        assert_eq!(
            owning_package("apps/site/test-results/jest.json"),
            ("site".to_string(), "apps/site".to_string())
        );
        assert_eq!(
            owning_package("services/packages/api/out/junit.xml"),
            ("api".to_string(), "services/packages/api".to_string())
        );
        assert_eq!(
            owning_package("test-results/junit.xml"),
            (ROOT_PACKAGE.to_string(), String::new())
        );
        // a file directly inside packages/ has no package directory
        assert_eq!(owning_package("packages/junit.xml").0, ROOT_PACKAGE);
    }

    #[test]
    fn test_all_files_walks_root_itself() {
        let options = CollectOptions::all_files();
        assert_eq!(options.patterns, vec!["**/*".to_string()]);
        assert_eq!(options.explicit_packages, vec![PathBuf::new()]);
        assert!(!options.exclude_patterns.is_empty());
    }
}
