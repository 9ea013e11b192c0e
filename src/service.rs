//! Measurement service
//!
//! Oracle -> filter -> strategy, for one validated configuration.

use std::time::Instant;

use crate::config::{MetricsConfig, MetricsSettings, StrategyKind};
use crate::error::Result;
use crate::measure::{
    DifferentialStrategy, FullSnapshotStrategy, MeasurementStrategy, ProgressReporter, TreeQueryStrategy,
    VerboseProgress,
};
use crate::model::{CommitDetails, CommitWithMetrics};
use crate::repository::{CommitLogQuery, CommitOracle, GitLogOracle, GitObjectStore, ObjectStore};

/// The strategy chosen by configuration
pub enum SelectedStrategy<'a, S: ObjectStore> {
    FullSnapshot(FullSnapshotStrategy<'a, S>),
    Differential(DifferentialStrategy<'a, S>),
    TreeQuery(TreeQueryStrategy<'a, S>),
}

impl<'a, S: ObjectStore> SelectedStrategy<'a, S> {
    pub fn for_settings(settings: &'a MetricsSettings, store: &'a S, progress: &'a dyn ProgressReporter) -> Self {
        match settings.strategy() {
            StrategyKind::FullSnapshot => Self::FullSnapshot(FullSnapshotStrategy::new(settings, store, progress)),
            StrategyKind::Differential => Self::Differential(DifferentialStrategy::new(settings, store, progress)),
            StrategyKind::TreeQuery => Self::TreeQuery(TreeQueryStrategy::new(settings, store, progress)),
        }
    }
}

impl<S: ObjectStore> MeasurementStrategy for SelectedStrategy<'_, S> {
    async fn calculate_metrics_for_commits(&self, commits: &[CommitDetails]) -> Result<Vec<CommitWithMetrics>> {
        match self {
            Self::FullSnapshot(s) => s.calculate_metrics_for_commits(commits).await,
            Self::Differential(s) => s.calculate_metrics_for_commits(commits).await,
            Self::TreeQuery(s) => s.calculate_metrics_for_commits(commits).await,
        }
    }
}

/// Drop commits whose changes are all in-place edits when `ignore_modified_only` is set
pub fn filter_commits(commits: Vec<CommitDetails>, ignore_modified_only: bool) -> Vec<CommitDetails> {
    if !ignore_modified_only {
        return commits;
    }
    commits.into_iter().filter(CommitDetails::has_non_modify_change).collect()
}

pub struct MeasurementService<'a, O: CommitOracle, S: ObjectStore> {
    settings: &'a MetricsSettings,
    oracle: &'a O,
    store: &'a S,
    progress: Box<dyn ProgressReporter>,
}

impl<'a, O: CommitOracle, S: ObjectStore> MeasurementService<'a, O, S> {
    pub fn new(settings: &'a MetricsSettings, oracle: &'a O, store: &'a S) -> Self {
        Self {
            settings,
            oracle,
            store,
            progress: Box::new(VerboseProgress::for_settings(settings)),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Commit log query derived from the settings; the path filter is the
    /// union of every metric's globs
    pub fn commit_log_query(&self) -> CommitLogQuery {
        CommitLogQuery {
            since: self.settings.since(),
            until: self.settings.until(),
            max_count: self.settings.max_commits_count(),
            path_filter: self.settings.tracked_paths(),
        }
    }

    /// Latest-first metrics for every retained commit in the window
    pub async fn run(&self) -> Result<Vec<CommitWithMetrics>> {
        let start = Instant::now();

        let query = self.commit_log_query();
        let commits = self.oracle.commit_log(&query).await?;
        let total = commits.len();
        let commits = filter_commits(commits, self.settings.ignore_modified_only_commits());
        tracing::info!(
            commits = commits.len(),
            skipped = total - commits.len(),
            strategy = ?self.settings.strategy(),
            "measuring commit window"
        );

        let strategy = SelectedStrategy::for_settings(self.settings, self.store, self.progress.as_ref());
        let results = strategy.calculate_metrics_for_commits(&commits).await?;

        tracing::info!(commits = results.len(), elapsed = ?start.elapsed(), "measurement complete");
        Ok(results)
    }
}

/// Resolve `config` and measure the repository it names
pub async fn measure(config: &MetricsConfig) -> Result<Vec<CommitWithMetrics>> {
    let settings = config.resolve()?;
    let oracle = GitLogOracle::new(settings.repository_path());
    let store = GitObjectStore::open(&settings)?;
    MeasurementService::new(&settings, &oracle, &store).run().await
}
