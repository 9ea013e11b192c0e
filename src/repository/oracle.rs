//! Commit log oracle
//!
//! Supplies the ordered commit list, latest first, with per-file change status.

use crate::error::Result;
use crate::model::CommitDetails;
use crate::util::GlobMatcher;

/// Which commits the oracle should return
#[derive(Debug, Clone, Default)]
pub struct CommitLogQuery {
    /// Inclusive lower bound on commit time (Unix seconds)
    pub since: Option<i64>,
    /// Inclusive upper bound on commit time (Unix seconds)
    pub until: Option<i64>,
    pub max_count: Option<usize>,
    /// Only commits touching a path matched by these globs
    pub path_filter: Option<GlobMatcher>,
}

impl CommitLogQuery {
    /// Render the path filter as a space-separated list of single-quoted globs,
    /// the form a `git log -- <paths>` invocation takes
    pub fn files_argument(&self) -> Option<String> {
        let filter = self.path_filter.as_ref()?;
        if filter.is_empty() {
            return None;
        }
        Some(
            filter
                .globs()
                .iter()
                .map(|g| format!("'{}'", g))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    pub fn within_window(&self, commit_time: i64) -> bool {
        self.since.is_none_or(|since| commit_time >= since)
            && self.until.is_none_or(|until| commit_time <= until)
    }

    pub fn touches_filtered_path(&self, commit: &CommitDetails) -> bool {
        match &self.path_filter {
            Some(filter) => commit.touched_paths().any(|path| filter.is_match(path)),
            None => true,
        }
    }

    pub fn is_full(&self, collected: usize) -> bool {
        self.max_count.is_some_and(|max| collected >= max)
    }
}

/// Source of commit history
#[allow(async_fn_in_trait)]
pub trait CommitOracle {
    /// Commits admitted by `query`, latest first
    async fn commit_log(&self, query: &CommitLogQuery) -> Result<Vec<CommitDetails>>;
}
