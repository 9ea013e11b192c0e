//! Metric calculation over one commit's file list

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use rustc_hash::FxHashMap;

use crate::config::ContentLookupPolicy;
use crate::error::{MetricsError, Result};
use crate::model::{CommitMetrics, MetricDefinition};
use crate::repository::ObjectStore;

/// Answers "does this file contain this phrase" for one revision
#[allow(async_fn_in_trait)]
pub trait PhraseProbe {
    async fn contains_phrase(&self, path: &str, phrase: &str) -> Result<bool>;
}

/// Reads files from a materialized checkout
pub struct CheckoutProbe<'a> {
    root: &'a Path,
    revision: &'a str,
}

impl<'a> CheckoutProbe<'a> {
    pub fn new(root: &'a Path, revision: &'a str) -> Self {
        Self { root, revision }
    }

    /// Symlinks are read as their target path, which is what git stores
    async fn read_content(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        let meta = tokio::fs::symlink_metadata(path).await?;
        if meta.file_type().is_symlink() {
            let target: PathBuf = tokio::fs::read_link(path).await?;
            Ok(target.to_string_lossy().into_owned().into_bytes())
        } else {
            tokio::fs::read(path).await
        }
    }
}

impl PhraseProbe for CheckoutProbe<'_> {
    async fn contains_phrase(&self, path: &str, phrase: &str) -> Result<bool> {
        let full = self.root.join(path);
        match self.read_content(&full).await {
            Ok(content) => Ok(contains_bytes(&content, phrase.as_bytes())),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(MetricsError::lookup(
                self.revision,
                format!("'{}' missing from checkout", path),
            )),
            Err(e) => Err(MetricsError::lookup(self.revision, format!("cannot read '{}': {}", path, e))),
        }
    }
}

/// Queries the object store at one revision
pub struct RevisionProbe<'a, S: ObjectStore> {
    store: &'a S,
    revision: &'a str,
}

impl<'a, S: ObjectStore> RevisionProbe<'a, S> {
    pub fn new(store: &'a S, revision: &'a str) -> Self {
        Self { store, revision }
    }
}

impl<S: ObjectStore> PhraseProbe for RevisionProbe<'_, S> {
    async fn contains_phrase(&self, path: &str, phrase: &str) -> Result<bool> {
        self.store.phrase_contains(self.revision, path, phrase).await
    }
}

/// Literal substring search, not line-anchored
pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// Computes `CommitMetrics` for one commit from its file list
pub struct MetricCalculator<'a> {
    metrics: &'a [MetricDefinition],
    max_concurrent_lookups: usize,
    policy: ContentLookupPolicy,
}

impl<'a> MetricCalculator<'a> {
    pub fn new(metrics: &'a [MetricDefinition], max_concurrent_lookups: usize, policy: ContentLookupPolicy) -> Self {
        Self {
            metrics,
            max_concurrent_lookups: max_concurrent_lookups.max(1),
            policy,
        }
    }

    /// Count files per metric. Duplicate paths in `files` count once.
    pub async fn measure<P: PhraseProbe>(&self, revision: &str, files: &[String], probe: &P) -> Result<CommitMetrics> {
        let files: BTreeSet<&str> = files.iter().map(String::as_str).collect();
        let mut result = CommitMetrics::zeroed(self.metrics);

        // (path, phrase) -> metrics waiting on that answer
        let mut pending: FxHashMap<(&str, &str), Vec<&str>> = FxHashMap::default();
        for metric in self.metrics {
            for path in files.iter().copied().filter(|p| metric.globs().is_match(p)) {
                match metric.phrase() {
                    None => result.increment(metric.name()),
                    Some(phrase) => pending.entry((path, phrase)).or_default().push(metric.name()),
                }
            }
        }
        if pending.is_empty() {
            return Ok(result);
        }

        let mut queries: Vec<(&str, &str)> = pending.keys().copied().collect();
        queries.sort_unstable();

        let answers: Vec<((&str, &str), Result<bool>)> = stream::iter(queries)
            .map(|(path, phrase)| async move { ((path, phrase), probe.contains_phrase(path, phrase).await) })
            .buffered(self.max_concurrent_lookups)
            .collect()
            .await;

        for (key, answer) in answers {
            let found = match answer {
                Ok(found) => found,
                Err(e) if self.policy == ContentLookupPolicy::BestEffort => {
                    tracing::warn!(revision, path = key.0, error = %e, "phrase lookup failed, counting as absent");
                    false
                }
                Err(e) => return Err(e),
            };
            if found {
                for name in &pending[&key] {
                    result.increment(name);
                }
            }
        }
        Ok(result)
    }
}
