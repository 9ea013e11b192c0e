//! Object store port
//!
//! Decouples the measurement strategies from how revisions are read, so the
//! strategies can be exercised against an in-memory repository with no
//! external tools.

use std::path::Path;

use crate::error::Result;
use crate::util::GlobMatcher;

/// Point-in-time queries against a repository's object store.
///
/// Revisions are full commit hashes as reported by the commit log.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Paths present in the revision's tree that `matcher` accepts, sorted
    async fn list_paths(&self, revision: &str, matcher: &GlobMatcher) -> Result<Vec<String>>;

    /// Whether the file at `path` in the revision contains `phrase` as a
    /// literal byte substring.
    ///
    /// A path absent from the revision is a lookup error, not `false`.
    async fn phrase_contains(&self, revision: &str, path: &str, phrase: &str) -> Result<bool>;

    /// Export exactly the revision's tree into `dest`.
    ///
    /// `dest` is emptied first; a tree that extracts to nothing is
    /// `MetricsError::EmptyArchive`.
    async fn materialize(&self, revision: &str, dest: &Path) -> Result<()>;
}
