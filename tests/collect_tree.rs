//! Integration tests for artifact collection in a monorepo layout.

use std::fs;
use std::path::{Path, PathBuf};

use report_wiki::collect::{CollectOptions, Collector, PackageReports, ROOT_PACKAGE};
use report_wiki::formats::ReportFormat;
use tempfile::TempDir;

const JUNIT: &str = include_str!("fixtures/junit.xml");
const JEST: &str = include_str!("fixtures/jest-results.json");
const CUCUMBER: &str = include_str!("fixtures/cucumber.json");

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn monorepo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "packages/web/test-results/jest-results.json", JEST);
    write(root, "packages/web/junit.xml", JUNIT);
    write(root, "packages/web/package.json", "{\"name\":\"web\"}");
    write(root, "packages/web/node_modules/dep/junit.xml", JUNIT);
    write(root, "packages/web/dist/junit.xml", JUNIT);
    write(root, "apps/shop/reports/cucumber.json", CUCUMBER);
    write(root, "apps/shop/reports/notes.json", "{\"note\":true}");
    write(root, "test-results/junit.xml", JUNIT);
    write(root, "src/junit.xml", JUNIT);
    dir
}

fn paths(package: &PackageReports) -> Vec<&str> {
    package.artifacts.iter().map(|a| a.relative_path.as_str()).collect()
}

#[test]
fn test_default_collection_groups_by_package() {
    let dir = monorepo();
    let reports = Collector::new(dir.path())
        .collect(&CollectOptions::default())
        .unwrap();

    let names: Vec<&str> = reports.iter().map(|p| p.package_name.as_str()).collect();
    assert_eq!(names, vec![ROOT_PACKAGE, "shop", "web"]);

    let root = &reports[0];
    // src/ is not a walk root
    assert_eq!(paths(root), vec!["test-results/junit.xml"]);
    assert_eq!(root.package_path, dir.path().join(""));

    let shop = &reports[1];
    assert_eq!(
        paths(shop),
        vec!["apps/shop/reports/cucumber.json", "apps/shop/reports/notes.json"]
    );
    assert_eq!(shop.artifacts[0].format, ReportFormat::Cucumber);
    assert_eq!(shop.artifacts[1].format, ReportFormat::Unknown);
    assert_eq!(shop.package_path, dir.path().join("apps/shop"));

    let web = &reports[2];
    // sorted listing: junit.xml before test-results/
    assert_eq!(
        paths(web),
        vec!["packages/web/junit.xml", "packages/web/test-results/jest-results.json"]
    );
    assert_eq!(web.artifacts[0].size, JUNIT.len() as u64);
    assert_eq!(web.artifacts[1].format, ReportFormat::Jest);
}

#[test]
fn test_excluded_directories_are_pruned() {
    let dir = monorepo();
    let reports = Collector::new(dir.path())
        .collect(&CollectOptions::default())
        .unwrap();
    for package in &reports {
        for artifact in &package.artifacts {
            assert!(!artifact.relative_path.contains("node_modules"));
            assert!(!artifact.relative_path.contains("/dist/"));
        }
    }

    let mut options = CollectOptions::default();
    options.exclude_patterns.push("**/reports".to_string());
    let reports = Collector::new(dir.path()).collect(&options).unwrap();
    assert!(reports.iter().all(|p| p.package_name != "shop"));
}

#[test]
fn test_missing_directories_are_not_errors() {
    let dir = TempDir::new().unwrap();
    let reports = Collector::new(dir.path())
        .collect(&CollectOptions::default())
        .unwrap();
    assert!(reports.is_empty());

    let reports = Collector::new(dir.path().join("nope"))
        .collect(&CollectOptions::default())
        .unwrap();
    assert!(reports.is_empty());
}

#[test]
fn test_explicit_packages_deduplicate_overlapping_roots() {
    let dir = monorepo();
    let options = CollectOptions {
        explicit_packages: vec![
            PathBuf::from("packages/web"),
            PathBuf::from("packages/web/test-results"),
            PathBuf::from("packages/missing"),
        ],
        ..CollectOptions::default()
    };
    let reports = Collector::new(dir.path()).collect(&options).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].package_name, "web");
    assert_eq!(reports[0].artifacts.len(), 2);
}

#[test]
fn test_custom_patterns_replace_defaults() {
    let dir = monorepo();
    let options = CollectOptions {
        patterns: vec!["**/*.json".to_string()],
        ..CollectOptions::default()
    };
    let reports = Collector::new(dir.path()).collect(&options).unwrap();
    let all: Vec<&str> = reports.iter().flat_map(paths).collect();
    assert!(all.contains(&"packages/web/package.json"));
    assert!(!all.iter().any(|p| p.ends_with(".xml")));
}

#[test]
fn test_all_files_walks_collection_root() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "junit.xml", JUNIT);
    write(dir.path(), "e2e/cucumber.json", CUCUMBER);
    write(dir.path(), "readme.txt", "hello");
    write(dir.path(), "node_modules/x/junit.xml", JUNIT);

    let reports = Collector::new(dir.path())
        .collect(&CollectOptions::all_files())
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        paths(&reports[0]),
        vec!["e2e/cucumber.json", "junit.xml", "readme.txt"]
    );
    assert_eq!(reports[0].artifacts[2].format, ReportFormat::Unknown);
}

#[cfg(unix)]
#[test]
fn test_symlink_loops_are_not_followed() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "packages/web/junit.xml", JUNIT);
    std::os::unix::fs::symlink("..", root.join("packages/web/loop")).unwrap();
    std::os::unix::fs::symlink(
        root.join("packages/web/junit.xml"),
        root.join("packages/web/linked-junit.xml"),
    )
    .unwrap();

    let reports = Collector::new(root)
        .collect(&CollectOptions::default())
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(paths(&reports[0]), vec!["packages/web/junit.xml"]);
}
