//! Differential strategy
//!
//! Only the oldest commit of the window is materialized. Every later commit's
//! metrics are its predecessor's metrics plus a delta derived from its own
//! status list, with content changes answered by a batch phrase cache.

use std::time::Instant;

use crate::config::MetricsSettings;
use crate::error::Result;
use crate::model::{CommitDetails, CommitMetrics, CommitWithMetrics, MetricDefinition, MetricDelta};
use crate::repository::ObjectStore;

use super::full_snapshot::FullSnapshotStrategy;
use super::phrase_cache::{PhraseCache, PhraseRequests};
use super::progress::{Phase, ProgressReporter};
use super::strategy::MeasurementStrategy;

pub struct DifferentialStrategy<'a, S: ObjectStore> {
    settings: &'a MetricsSettings,
    store: &'a S,
    progress: &'a dyn ProgressReporter,
}

/// A commit paired with the revision its changes are relative to
struct Step<'c> {
    commit: &'c CommitDetails,
    previous: &'c str,
}

impl<'a, S: ObjectStore> DifferentialStrategy<'a, S> {
    pub fn new(settings: &'a MetricsSettings, store: &'a S, progress: &'a dyn ProgressReporter) -> Self {
        Self {
            settings,
            store,
            progress,
        }
    }

    fn plan_lookups(&self, steps: &[Step<'_>]) -> PhraseRequests {
        let mut requests = PhraseRequests::new();
        for step in steps {
            for transition in step.commit.transitions() {
                for metric in self.settings.metrics() {
                    let Some(phrase) = metric.phrase() else { continue };
                    if !metric.globs().is_match(transition.path) {
                        continue;
                    }
                    if transition.existed_before {
                        requests.request(transition.path, step.previous, phrase);
                    }
                    if transition.exists_after {
                        requests.request(transition.path, &step.commit.hash, phrase);
                    }
                }
            }
        }
        requests
    }
}

/// Net metric change of one commit
pub fn commit_delta(
    metrics: &[MetricDefinition],
    commit: &CommitDetails,
    previous: &str,
    cache: &PhraseCache,
) -> Result<MetricDelta> {
    let mut delta = MetricDelta::new();
    for transition in commit.transitions() {
        for metric in metrics {
            if !metric.globs().is_match(transition.path) {
                continue;
            }
            match metric.phrase() {
                None => {
                    delta.add(
                        metric.name(),
                        transition.exists_after as i64 - transition.existed_before as i64,
                    );
                }
                Some(phrase) => {
                    let was = if transition.existed_before {
                        cache.get(transition.path, previous, phrase)?
                    } else {
                        Some(false)
                    };
                    let now = if transition.exists_after {
                        cache.get(transition.path, &commit.hash, phrase)?
                    } else {
                        Some(false)
                    };
                    // A degraded lookup leaves this file out of the metric
                    if let (Some(was), Some(now)) = (was, now) {
                        delta.add(metric.name(), now as i64 - was as i64);
                    }
                }
            }
        }
    }
    Ok(delta)
}

impl<S: ObjectStore> MeasurementStrategy for DifferentialStrategy<'_, S> {
    async fn calculate_metrics_for_commits(&self, commits: &[CommitDetails]) -> Result<Vec<CommitWithMetrics>> {
        for commit in commits {
            commit.validate()?;
        }

        // Oldest first from here on
        let chronological: Vec<&CommitDetails> = commits.iter().rev().collect();
        let Some((&oldest, later)) = chronological.split_first() else {
            return Ok(Vec::new());
        };

        let steps: Vec<Step<'_>> = later
            .iter()
            .zip(chronological.iter())
            .map(|(&commit, &before)| Step {
                commit,
                previous: commit.parent.as_deref().unwrap_or(&before.hash),
            })
            .collect();

        let start = Instant::now();
        let requests = self.plan_lookups(&steps);
        tracing::info!(
            commits = commits.len(),
            lookups = requests.len(),
            "measuring oldest commit and resolving phrase lookups"
        );

        let full = FullSnapshotStrategy::new(self.settings, self.store, self.progress);
        let lookups = self.settings.max_concurrent_lookups();
        let policy = self.settings.content_lookup();
        let (base, cache) = futures::try_join!(
            async {
                if !self.settings.metrics().is_empty() {
                    self.settings.scratch().prepare_batch().await?;
                }
                full.calculate_metrics_for_single_commit(oldest).await
            },
            PhraseCache::resolve(self.store, requests, lookups, policy, self.progress),
        )?;
        tracing::debug!(elapsed = ?start.elapsed(), cached = cache.len(), "base measured");

        let pb = self.progress.phase(Phase::Deltas, steps.len());
        let mut results = Vec::with_capacity(commits.len());
        let mut current: CommitMetrics = base.metrics.clone();
        results.push(base);
        for step in &steps {
            let delta = commit_delta(self.settings.metrics(), step.commit, step.previous, &cache)?;
            if !delta.is_zero() {
                current = current.apply(&delta, &step.commit.hash)?;
            }
            results.push(CommitWithMetrics {
                commit: step.commit.clone(),
                metrics: current.clone(),
            });
            pb.advance();
        }
        pb.finish();

        results.reverse();
        Ok(results)
    }
}
