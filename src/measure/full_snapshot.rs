//! Full snapshot strategy
//!
//! Every commit is exported to its own checkout and measured from scratch.
//! This is the reference the other strategies must agree with.

use std::path::Path;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use walkdir::WalkDir;

use crate::config::MetricsSettings;
use crate::error::{MetricsError, Result};
use crate::model::{CommitDetails, CommitMetrics, CommitSnapshot, CommitWithMetrics};
use crate::repository::{discard_dir, ObjectStore};

use super::calculator::{CheckoutProbe, MetricCalculator};
use super::progress::{Phase, ProgressReporter};
use super::strategy::MeasurementStrategy;

pub struct FullSnapshotStrategy<'a, S: ObjectStore> {
    settings: &'a MetricsSettings,
    store: &'a S,
    progress: &'a dyn ProgressReporter,
}

impl<'a, S: ObjectStore> FullSnapshotStrategy<'a, S> {
    pub fn new(settings: &'a MetricsSettings, store: &'a S, progress: &'a dyn ProgressReporter) -> Self {
        Self {
            settings,
            store,
            progress,
        }
    }

    /// Materialize, enumerate and measure one commit
    pub async fn calculate_metrics_for_single_commit(&self, commit: &CommitDetails) -> Result<CommitWithMetrics> {
        if self.settings.metrics().is_empty() {
            return Ok(CommitWithMetrics {
                commit: commit.clone(),
                metrics: CommitMetrics::default(),
            });
        }

        let start = Instant::now();
        let snapshot = CommitSnapshot {
            commit,
            clone_destination: self.settings.scratch().checkout_dir(&commit.hash),
        };

        let measured = self.measure_snapshot(&snapshot).await;
        discard_dir(&snapshot.clone_destination).await;
        let metrics = measured?;

        tracing::debug!(commit = commit.short_hash(), elapsed = ?start.elapsed(), "measured snapshot");
        Ok(CommitWithMetrics {
            commit: commit.clone(),
            metrics,
        })
    }

    async fn measure_snapshot(&self, snapshot: &CommitSnapshot<'_>) -> Result<CommitMetrics> {
        let hash = &snapshot.commit.hash;
        self.store.materialize(hash, &snapshot.clone_destination).await?;

        let files = list_checkout_files(&snapshot.clone_destination, hash).await?;
        let calculator = MetricCalculator::new(
            self.settings.metrics(),
            self.settings.max_concurrent_lookups(),
            self.settings.content_lookup(),
        );
        let probe = CheckoutProbe::new(&snapshot.clone_destination, hash);
        calculator.measure(hash, &files, &probe).await
    }
}

impl<S: ObjectStore> MeasurementStrategy for FullSnapshotStrategy<'_, S> {
    async fn calculate_metrics_for_commits(&self, commits: &[CommitDetails]) -> Result<Vec<CommitWithMetrics>> {
        if commits.is_empty() {
            return Ok(Vec::new());
        }
        if !self.settings.metrics().is_empty() {
            self.settings.scratch().prepare_batch().await?;
        }

        let pb = self.progress.phase(Phase::Snapshots, commits.len());
        let results = stream::iter(commits)
            .map(|commit| {
                let pb = &pb;
                async move {
                    let result = self.calculate_metrics_for_single_commit(commit).await;
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

/// Every non-directory entry under `root`, as sorted `/`-separated relative paths
pub async fn list_checkout_files(root: &Path, revision: &str) -> Result<Vec<String>> {
    let root = root.to_path_buf();
    let failed_revision = revision.to_string();
    let revision = revision.to_string();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| MetricsError::lookup(&revision, format!("cannot walk checkout: {}", e)))?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(|e| MetricsError::lookup(&revision, e))?;
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(path);
        }
        files.sort();
        Ok(files)
    })
    .await
    .map_err(|e| MetricsError::lookup(&failed_revision, format!("checkout walk panicked: {}", e)))?
}
