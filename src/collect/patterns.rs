//! Include/exclude glob patterns.

/// Report files picked up when no patterns are configured.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "**/*junit*.xml",
    "**/TEST-*.xml",
    "**/surefire-reports/*.xml",
    "**/*jest*.json",
    "**/*vitest*.json",
    "**/*cucumber*.json",
    "**/test-results/**/*.xml",
    "**/test-results/**/*.json",
    "**/reports/**/*.xml",
    "**/reports/**/*.json",
    "**/coverage/coverage-summary.json",
];

/// Dependency caches and build output.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/node_modules",
    "**/dist",
    "**/build",
    "**/.git",
    "**/target",
    "**/.next",
    "**/.turbo",
];

/// Match a `/`-separated relative path against one glob.
///
/// A leading `**/` also matches at the top level, so `**/junit.xml`
/// matches `junit.xml`.
pub fn matches_glob(pattern: &str, path: &str) -> bool {
    if glob_match::glob_match(pattern, path) {
        return true;
    }
    match pattern.strip_prefix("**/") {
        Some(rest) => glob_match::glob_match(rest, path),
        None => false,
    }
}

pub fn matches_any<S: AsRef<str>>(patterns: &[S], path: &str) -> bool {
    patterns.iter().any(|p| matches_glob(p.as_ref(), path))
}
