//! Measurement configuration
//!
//! `MetricsConfig` is the JSON surface; `MetricsConfig::resolve` validates it
//! once into `MetricsSettings`, which every component borrows.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{MetricsError, Result};
use crate::model::MetricDefinition;
use crate::repository::{ArchiveFormat, ScratchSpace};
use crate::util::{parse_date_bound, DateBound, GlobCache, GlobMatcher};

const DEFAULT_SUBPROCESS_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 16;

/// A phrase tracked inside files selected by globs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentMetricConfig {
    pub globs: Vec<String>,
    pub phrase: String,
}

/// How a failed phrase lookup is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentLookupPolicy {
    /// Any failed lookup fails the batch
    #[default]
    Strict,
    /// A failed lookup contributes 0 to its metric and is logged
    BestEffort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StrategyKind {
    #[default]
    FullSnapshot,
    Differential,
    TreeQuery,
}

impl FromStr for StrategyKind {
    type Err = MetricsError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "full-snapshot" => Ok(StrategyKind::FullSnapshot),
            "differential" => Ok(StrategyKind::Differential),
            "tree-query" => Ok(StrategyKind::TreeQuery),
            other => Err(MetricsError::config(format!(
                "unknown strategy '{}' (expected full-snapshot, differential or tree-query)",
                other
            ))),
        }
    }
}

/// Raw configuration as read from JSON
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsConfig {
    pub repository_path: PathBuf,
    pub max_commits_count: Option<usize>,
    pub commits_since: Option<String>,
    pub commits_until: Option<String>,
    #[serde(alias = "metricNameToGlob")]
    pub track_by_file_extension: BTreeMap<String, Vec<String>>,
    pub track_by_file_content: BTreeMap<String, ContentMetricConfig>,
    pub strategy: String,
    #[serde(alias = "ignoreModifiedFiles")]
    pub ignore_modified_only_commits: bool,
    pub archive_format: ArchiveFormat,
    pub scratch_root: Option<PathBuf>,
    pub subprocess_timeout_secs: u64,
    pub max_concurrent_commits: Option<usize>,
    pub max_concurrent_lookups: usize,
    pub content_lookup: ContentLookupPolicy,
    pub show_progress: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            repository_path: PathBuf::new(),
            max_commits_count: None,
            commits_since: None,
            commits_until: None,
            track_by_file_extension: BTreeMap::new(),
            track_by_file_content: BTreeMap::new(),
            strategy: "full-snapshot".to_string(),
            ignore_modified_only_commits: false,
            archive_format: ArchiveFormat::default(),
            scratch_root: None,
            subprocess_timeout_secs: DEFAULT_SUBPROCESS_TIMEOUT_SECS,
            max_concurrent_commits: None,
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
            content_lookup: ContentLookupPolicy::default(),
            show_progress: false,
        }
    }
}

impl MetricsConfig {
    pub fn new(repository_path: impl Into<PathBuf>) -> Self {
        Self {
            repository_path: repository_path.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| MetricsError::config(format!("malformed configuration: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| MetricsError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn track_extension<S: AsRef<str>>(mut self, name: &str, globs: &[S]) -> Self {
        self.track_by_file_extension
            .insert(name.to_string(), globs.iter().map(|g| g.as_ref().to_string()).collect());
        self
    }

    pub fn track_content<S: AsRef<str>>(mut self, name: &str, globs: &[S], phrase: &str) -> Self {
        self.track_by_file_content.insert(
            name.to_string(),
            ContentMetricConfig {
                globs: globs.iter().map(|g| g.as_ref().to_string()).collect(),
                phrase: phrase.to_string(),
            },
        );
        self
    }

    pub fn with_strategy(mut self, strategy: &str) -> Self {
        self.strategy = strategy.to_string();
        self
    }

    /// Validate everything up front; nothing downstream re-reads the raw config
    pub fn resolve(&self) -> Result<MetricsSettings> {
        if self.repository_path.as_os_str().is_empty() {
            return Err(MetricsError::config("repositoryPath is required"));
        }
        let strategy = StrategyKind::from_str(&self.strategy)?;

        let mut cache = GlobCache::new();
        let mut metrics = Vec::with_capacity(self.track_by_file_extension.len() + self.track_by_file_content.len());
        for (name, globs) in &self.track_by_file_extension {
            metrics.push(MetricDefinition::Extension {
                name: name.clone(),
                globs: cache.compile(globs)?,
            });
        }
        for (name, content) in &self.track_by_file_content {
            if self.track_by_file_extension.contains_key(name) {
                return Err(MetricsError::config(format!(
                    "metric '{}' is defined both by extension and by content",
                    name
                )));
            }
            metrics.push(MetricDefinition::Content {
                name: name.clone(),
                globs: cache.compile(&content.globs)?,
                phrase: content.phrase.clone(),
            });
        }

        if self.ignore_modified_only_commits && !self.track_by_file_content.is_empty() {
            return Err(MetricsError::config(
                "ignoreModifiedOnlyCommits cannot be combined with content metrics: a modify-only commit can change them",
            ));
        }

        let since = self
            .commits_since
            .as_deref()
            .map(|d| parse_date_bound(d, DateBound::Since))
            .transpose()?;
        let until = self
            .commits_until
            .as_deref()
            .map(|d| parse_date_bound(d, DateBound::Until))
            .transpose()?;

        let max_concurrent_commits = match self.max_concurrent_commits {
            Some(0) => return Err(MetricsError::config("maxConcurrentCommits must be at least 1")),
            Some(n) => n,
            None => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
        };
        if self.max_concurrent_lookups == 0 {
            return Err(MetricsError::config("maxConcurrentLookups must be at least 1"));
        }
        if self.subprocess_timeout_secs == 0 {
            return Err(MetricsError::config("subprocessTimeoutSecs must be at least 1"));
        }

        // Scratch paths are handed to git, tar and unzip; keep them absolute
        let scratch_root = self.scratch_root.clone().unwrap_or_else(default_scratch_root);
        let scratch_root = std::path::absolute(&scratch_root).unwrap_or(scratch_root);
        let repository_name = repository_name(&self.repository_path);

        Ok(MetricsSettings {
            repository_path: self.repository_path.clone(),
            scratch: ScratchSpace::new(&scratch_root, &repository_name),
            repository_name,
            metrics,
            strategy,
            ignore_modified_only_commits: self.ignore_modified_only_commits,
            since,
            until,
            max_commits_count: self.max_commits_count,
            archive_format: self.archive_format,
            subprocess_timeout: Duration::from_secs(self.subprocess_timeout_secs),
            max_concurrent_commits,
            max_concurrent_lookups: self.max_concurrent_lookups,
            content_lookup: self.content_lookup,
            show_progress: self.show_progress,
        })
    }
}

fn default_scratch_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("repometrics")
}

fn repository_name(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    resolved
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo")
        .to_string()
}

/// Validated configuration for one measurement
#[derive(Debug, Clone)]
pub struct MetricsSettings {
    repository_path: PathBuf,
    repository_name: String,
    scratch: ScratchSpace,
    metrics: Vec<MetricDefinition>,
    strategy: StrategyKind,
    ignore_modified_only_commits: bool,
    since: Option<i64>,
    until: Option<i64>,
    max_commits_count: Option<usize>,
    archive_format: ArchiveFormat,
    subprocess_timeout: Duration,
    max_concurrent_commits: usize,
    max_concurrent_lookups: usize,
    content_lookup: ContentLookupPolicy,
    show_progress: bool,
}

impl MetricsSettings {
    pub fn repository_path(&self) -> &Path {
        &self.repository_path
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Extension metrics first, then content metrics, each sorted by name
    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    pub fn has_content_metrics(&self) -> bool {
        self.metrics.iter().any(MetricDefinition::is_content)
    }

    /// Union of every metric's globs; `None` when nothing is tracked
    pub fn tracked_paths(&self) -> Option<GlobMatcher> {
        if self.metrics.is_empty() {
            return None;
        }
        Some(GlobMatcher::union(self.metrics.iter().map(MetricDefinition::globs)))
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    pub fn ignore_modified_only_commits(&self) -> bool {
        self.ignore_modified_only_commits
    }

    pub fn since(&self) -> Option<i64> {
        self.since
    }

    pub fn until(&self) -> Option<i64> {
        self.until
    }

    pub fn max_commits_count(&self) -> Option<usize> {
        self.max_commits_count
    }

    pub fn archive_format(&self) -> ArchiveFormat {
        self.archive_format
    }

    pub fn subprocess_timeout(&self) -> Duration {
        self.subprocess_timeout
    }

    pub fn max_concurrent_commits(&self) -> usize {
        self.max_concurrent_commits
    }

    pub fn max_concurrent_lookups(&self) -> usize {
        self.max_concurrent_lookups
    }

    pub fn content_lookup(&self) -> ContentLookupPolicy {
        self.content_lookup
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }
}
