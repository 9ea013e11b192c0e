use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{MetricsError, Result};
use crate::util::GlobMatcher;

use super::CommitDetails;

/// One tracked metric
#[derive(Debug, Clone)]
pub enum MetricDefinition {
    /// Number of files matching the globs
    Extension { name: String, globs: GlobMatcher },
    /// Number of glob-matching files whose bytes contain `phrase`
    Content {
        name: String,
        globs: GlobMatcher,
        phrase: String,
    },
}

impl MetricDefinition {
    pub fn name(&self) -> &str {
        match self {
            MetricDefinition::Extension { name, .. } | MetricDefinition::Content { name, .. } => name,
        }
    }

    pub fn globs(&self) -> &GlobMatcher {
        match self {
            MetricDefinition::Extension { globs, .. } | MetricDefinition::Content { globs, .. } => globs,
        }
    }

    pub fn phrase(&self) -> Option<&str> {
        match self {
            MetricDefinition::Extension { .. } => None,
            MetricDefinition::Content { phrase, .. } => Some(phrase),
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, MetricDefinition::Content { .. })
    }
}

/// Metric name -> count, one entry per configured metric
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommitMetrics(BTreeMap<String, u64>);

impl CommitMetrics {
    /// Every configured metric at zero
    pub fn zeroed(definitions: &[MetricDefinition]) -> Self {
        Self(definitions.iter().map(|d| (d.name().to_string(), 0)).collect())
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.get(name).copied()
    }

    pub fn increment(&mut self, name: &str) {
        *self.0.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// `self ⊕ delta`: per-name sum, names absent from the delta are kept.
    ///
    /// Going below zero means the delta does not describe a change from these
    /// metrics, so it is reported instead of clamped.
    pub fn apply(&self, delta: &MetricDelta, commit: &str) -> Result<CommitMetrics> {
        let mut next = self.0.clone();
        for (name, value) in next.iter_mut() {
            let change = delta.get(name);
            let updated = *value as i64 + change;
            if updated < 0 {
                return Err(MetricsError::lookup(
                    commit,
                    format!("metric '{}' would drop to {} ({} {:+})", name, updated, value, change),
                ));
            }
            *value = updated as u64;
        }
        Ok(CommitMetrics(next))
    }
}

impl FromIterator<(String, u64)> for CommitMetrics {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Net per-metric change caused by exactly one commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricDelta(BTreeMap<String, i64>);

impl MetricDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, change: i64) {
        if change != 0 {
            *self.0.entry(name.to_string()).or_insert(0) += change;
        }
    }

    pub fn get(&self, name: &str) -> i64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.values().all(|v| *v == 0)
    }
}

/// A commit together with its measured metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitWithMetrics {
    pub commit: CommitDetails,
    pub metrics: CommitMetrics,
}
