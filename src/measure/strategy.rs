use crate::error::Result;
use crate::model::{CommitDetails, CommitWithMetrics};

/// Turns a commit window into per-commit metrics.
///
/// `commits` arrive latest first; the result has one entry per commit in the
/// same order. Any failure fails the whole batch.
#[allow(async_fn_in_trait)]
pub trait MeasurementStrategy {
    async fn calculate_metrics_for_commits(&self, commits: &[CommitDetails]) -> Result<Vec<CommitWithMetrics>>;
}
