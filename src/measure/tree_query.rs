//! Tree query strategy
//!
//! Measures each commit straight from the object store: list the tracked
//! paths of its tree, then ask for phrase containment per path. Nothing is
//! written to disk.

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::config::MetricsSettings;
use crate::error::Result;
use crate::model::{CommitDetails, CommitMetrics, CommitWithMetrics};
use crate::repository::ObjectStore;
use crate::util::GlobMatcher;

use super::calculator::{MetricCalculator, RevisionProbe};
use super::progress::{Phase, ProgressReporter};
use super::strategy::MeasurementStrategy;

pub struct TreeQueryStrategy<'a, S: ObjectStore> {
    settings: &'a MetricsSettings,
    store: &'a S,
    progress: &'a dyn ProgressReporter,
}

impl<'a, S: ObjectStore> TreeQueryStrategy<'a, S> {
    pub fn new(settings: &'a MetricsSettings, store: &'a S, progress: &'a dyn ProgressReporter) -> Self {
        Self {
            settings,
            store,
            progress,
        }
    }

    async fn measure_commit(&self, commit: &CommitDetails, tracked: &GlobMatcher) -> Result<CommitWithMetrics> {
        if tracked.is_empty() {
            return Ok(CommitWithMetrics {
                commit: commit.clone(),
                metrics: CommitMetrics::zeroed(self.settings.metrics()),
            });
        }

        let files = self.store.list_paths(&commit.hash, tracked).await?;
        let calculator = MetricCalculator::new(
            self.settings.metrics(),
            self.settings.max_concurrent_lookups(),
            self.settings.content_lookup(),
        );
        let probe = RevisionProbe::new(self.store, &commit.hash);
        let metrics = calculator.measure(&commit.hash, &files, &probe).await?;
        tracing::debug!(commit = commit.short_hash(), files = files.len(), "measured tree");
        Ok(CommitWithMetrics {
            commit: commit.clone(),
            metrics,
        })
    }
}

impl<S: ObjectStore> MeasurementStrategy for TreeQueryStrategy<'_, S> {
    async fn calculate_metrics_for_commits(&self, commits: &[CommitDetails]) -> Result<Vec<CommitWithMetrics>> {
        let tracked = self.settings.tracked_paths().unwrap_or_default();
        let pb = self.progress.phase(Phase::TreeQueries, commits.len());
        let results = stream::iter(commits)
            .map(|commit| {
                let pb = &pb;
                let tracked = &tracked;
                async move {
                    let result = self.measure_commit(commit, tracked).await;
                    pb.advance();
                    result
                }
            })
            .buffered(self.settings.max_concurrent_commits())
            .try_collect()
            .await;
        pb.finish();
        results
    }
}
