//! `report-wiki.toml` configuration.
//!
//! Every section and key is optional; CLI flags override file values.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::collect::CollectOptions;
use crate::history::{
    DEFAULT_MAX_RECENT_RUNS, DEFAULT_MAX_REPORTS_PER_BRANCH, DEFAULT_MAX_RUNS_PER_BRANCH,
};
use crate::{ReportError, ReportResult};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "report-wiki.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WikiConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub collect: CollectConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Local checkout of the wiki
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            root: default_store_root(),
        }
    }
}

fn default_store_root() -> PathBuf {
    PathBuf::from("wiki")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    #[serde(default = "default_max_reports_per_branch")]
    pub max_reports_per_branch: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            max_reports_per_branch: DEFAULT_MAX_REPORTS_PER_BRANCH,
        }
    }
}

fn default_max_reports_per_branch() -> usize {
    DEFAULT_MAX_REPORTS_PER_BRANCH
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    #[serde(default = "default_max_recent_runs")]
    pub max_recent_runs: usize,
    #[serde(default = "default_max_runs_per_branch")]
    pub max_runs_per_branch: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            max_recent_runs: DEFAULT_MAX_RECENT_RUNS,
            max_runs_per_branch: DEFAULT_MAX_RUNS_PER_BRANCH,
        }
    }
}

fn default_max_recent_runs() -> usize {
    DEFAULT_MAX_RECENT_RUNS
}

fn default_max_runs_per_branch() -> usize {
    DEFAULT_MAX_RUNS_PER_BRANCH
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectConfig {
    /// Replaces the default include patterns when non-empty
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Added to the default exclude patterns
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub packages: Vec<PathBuf>,
}

impl CollectConfig {
    /// Merge file values and CLI values into collector options.
    pub fn options(
        &self,
        patterns: &[String],
        excludes: &[String],
        packages: &[PathBuf],
    ) -> CollectOptions {
        let mut options = CollectOptions::default();
        let patterns = if patterns.is_empty() { &self.patterns[..] } else { patterns };
        if !patterns.is_empty() {
            options.patterns = patterns.to_vec();
        }
        options
            .exclude_patterns
            .extend(self.exclude_patterns.iter().chain(excludes).cloned());
        options.explicit_packages = if packages.is_empty() {
            self.packages.clone()
        } else {
            packages.to_vec()
        };
        options
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    #[serde(default)]
    pub fail_on_error: bool,
    /// Command template run after publishing; see `CommandRemote`
    #[serde(default)]
    pub push_command: Option<String>,
}

impl WikiConfig {
    pub fn from_toml(s: &str) -> ReportResult<WikiConfig> {
        toml::from_str(s).map_err(|e| ReportError::Message(format!("failed to parse config: {e}")))
    }

    pub fn load(path: &Path) -> ReportResult<WikiConfig> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| ReportError::io(format!("failed to read config {}", path.display()), e))?;
        let config = WikiConfig::from_toml(&s)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load the explicit config, else `report-wiki.toml` if present, else
    /// defaults. An explicit path that does not exist is an error.
    pub fn discover(explicit: Option<&Path>) -> ReportResult<WikiConfig> {
        match explicit {
            Some(path) => WikiConfig::load(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    WikiConfig::load(path)
                } else {
                    Ok(WikiConfig::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WikiConfig::from_toml("").unwrap();
        assert_eq!(config.store.root, PathBuf::from("wiki"));
        assert_eq!(config.retention.max_reports_per_branch, 20);
        assert_eq!(config.index.max_recent_runs, 10);
        assert_eq!(config.index.max_runs_per_branch, 20);
        assert!(!config.publish.fail_on_error);
        assert!(config.publish.push_command.is_none());
    }

    #[test]
    fn test_full_file() {
        let config = WikiConfig::from_toml(
            r#"
[store]
root = "/srv/wiki"

[retention]
max_reports_per_branch = 5

[index]
max_recent_runs = 3

[collect]
patterns = ["**/out/*.xml"]
exclude_patterns = ["**/fixtures"]
packages = ["packages/api"]

[publish]
fail_on_error = true
push_command = "git -C {store} push"
"#,
        )
        .unwrap();
        assert_eq!(config.store.root, PathBuf::from("/srv/wiki"));
        assert_eq!(config.retention.max_reports_per_branch, 5);
        assert_eq!(config.index.max_recent_runs, 3);
        assert_eq!(config.index.max_runs_per_branch, 20);
        assert!(config.publish.fail_on_error);
        assert_eq!(config.collect.packages, vec![PathBuf::from("packages/api")]);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = WikiConfig::from_toml("[retention]\nmax = 3\n").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn test_collect_options_merge() {
        let config = WikiConfig::from_toml(
            "[collect]\npatterns = [\"**/a.xml\"]\nexclude_patterns = [\"**/tmp\"]\n",
        )
        .unwrap();

        let options = config.collect.options(&[], &[], &[]);
        assert_eq!(options.patterns, vec!["**/a.xml".to_string()]);
        assert!(options.exclude_patterns.contains(&"**/node_modules".to_string()));
        assert!(options.exclude_patterns.contains(&"**/tmp".to_string()));

        let cli = vec!["**/b.xml".to_string()];
        let options = config
            .collect
            .options(&cli, &["**/cache".to_string()], &[PathBuf::from("apps/web")]);
        assert_eq!(options.patterns, cli);
        assert!(options.exclude_patterns.contains(&"**/cache".to_string()));
        assert_eq!(options.explicit_packages, vec![PathBuf::from("apps/web")]);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        assert!(WikiConfig::discover(Some(Path::new("/definitely/missing.toml"))).is_err());
    }
}
