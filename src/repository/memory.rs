//! In-memory repository
//!
//! A linear history of file snapshots that serves both the commit log and
//! object store ports without git or any subprocess. Used by unit tests and
//! benchmarks.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashSet;

use crate::error::{MetricsError, Result};
use crate::measure::contains_bytes;
use crate::model::{CommitDetails, FileStatus};
use crate::util::GlobMatcher;

use super::materialize::empty_dir;
use super::oracle::{CommitLogQuery, CommitOracle};
use super::port::ObjectStore;

const BASE_TIME: i64 = 1_700_000_000;

struct StoredCommit {
    details: CommitDetails,
    time: i64,
    files: BTreeMap<String, Vec<u8>>,
}

/// Linear history, oldest commit first
#[derive(Default)]
pub struct MemoryRepository {
    commits: Vec<StoredCommit>,
    failing_lookups: FxHashSet<String>,
    materializations: AtomicUsize,
    lookups: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a commit on top of the current head
    pub fn commit(&mut self, subject: &str) -> CommitBuilder<'_> {
        let files = self
            .commits
            .last()
            .map(|c| c.files.clone())
            .unwrap_or_default();
        let time = BASE_TIME + self.commits.len() as i64 * 60;
        CommitBuilder {
            repo: self,
            subject: subject.to_string(),
            time,
            files,
            changes: Vec::new(),
        }
    }

    /// Phrase lookups of `path` fail at every revision
    pub fn with_failing_lookup(mut self, path: &str) -> Self {
        self.failing_lookups.insert(path.to_string());
        self
    }

    pub fn materialization_count(&self) -> usize {
        self.materializations.load(Ordering::Relaxed)
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn head(&self) -> Option<&str> {
        self.commits.last().map(|c| c.details.hash.as_str())
    }

    fn find(&self, revision: &str) -> Result<&StoredCommit> {
        self.commits
            .iter()
            .find(|c| c.details.hash == revision)
            .ok_or_else(|| MetricsError::lookup(revision, "unknown revision"))
    }

    fn fake_hash(index: usize) -> String {
        let mut bytes = [0xabu8; 20];
        bytes[12..].copy_from_slice(&(index as u64 + 1).to_be_bytes());
        hex::encode(bytes)
    }
}

/// Accumulates one commit's changes
pub struct CommitBuilder<'a> {
    repo: &'a mut MemoryRepository,
    subject: String,
    time: i64,
    files: BTreeMap<String, Vec<u8>>,
    changes: Vec<(FileStatus, String)>,
}

impl CommitBuilder<'_> {
    pub fn create(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.as_bytes().to_vec());
        self.changes.push((FileStatus::Added, path.to_string()));
        self
    }

    pub fn modify(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.as_bytes().to_vec());
        self.changes.push((FileStatus::Modified, path.to_string()));
        self
    }

    pub fn delete(mut self, path: &str) -> Self {
        self.files.remove(path);
        self.changes.push((FileStatus::Deleted, path.to_string()));
        self
    }

    pub fn rename(mut self, from: &str, to: &str) -> Self {
        let content = self.files.remove(from).unwrap_or_default();
        self.files.insert(to.to_string(), content);
        self.changes.push((FileStatus::Renamed { from: from.to_string() }, to.to_string()));
        self
    }

    /// Rename that also rewrites the file
    pub fn rename_with_content(mut self, from: &str, to: &str, content: &str) -> Self {
        self.files.remove(from);
        self.files.insert(to.to_string(), content.as_bytes().to_vec());
        self.changes.push((FileStatus::Renamed { from: from.to_string() }, to.to_string()));
        self
    }

    pub fn copy(mut self, from: &str, to: &str) -> Self {
        let content = self.files.get(from).cloned().unwrap_or_default();
        self.files.insert(to.to_string(), content);
        self.changes.push((FileStatus::Copied { from: from.to_string() }, to.to_string()));
        self
    }

    /// Record an explicit status entry without touching the files
    pub fn raw_change(mut self, status: FileStatus, path: &str) -> Self {
        self.changes.push((status, path.to_string()));
        self
    }

    pub fn at(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    pub fn finish(self) -> String {
        let index = self.repo.commits.len();
        let hash = MemoryRepository::fake_hash(index);

        let mut details = CommitDetails::new(hash.clone());
        details.parent = self.repo.head().map(str::to_string);
        details.subject = self.subject;
        details.author_name = "Test".to_string();
        details.author_email = "test@example.com".to_string();
        details.author_date = crate::util::format_author_date(self.time, 0);
        for (status, path) in self.changes {
            details.push_change(status, path);
        }

        self.repo.commits.push(StoredCommit {
            details,
            time: self.time,
            files: self.files,
        });
        hash
    }
}

impl CommitOracle for MemoryRepository {
    async fn commit_log(&self, query: &CommitLogQuery) -> Result<Vec<CommitDetails>> {
        let mut out = Vec::new();
        for commit in self.commits.iter().rev() {
            if query.is_full(out.len()) {
                break;
            }
            if query.within_window(commit.time) && query.touches_filtered_path(&commit.details) {
                out.push(commit.details.clone());
            }
        }
        Ok(out)
    }
}

impl ObjectStore for MemoryRepository {
    async fn list_paths(&self, revision: &str, matcher: &GlobMatcher) -> Result<Vec<String>> {
        let commit = self.find(revision)?;
        Ok(commit
            .files
            .keys()
            .filter(|path| matcher.is_match(path))
            .cloned()
            .collect())
    }

    async fn phrase_contains(&self, revision: &str, path: &str, phrase: &str) -> Result<bool> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if self.failing_lookups.contains(path) {
            return Err(MetricsError::lookup(revision, format!("cannot read '{}'", path)));
        }
        let commit = self.find(revision)?;
        let content = commit
            .files
            .get(path)
            .ok_or_else(|| MetricsError::lookup(revision, format!("no file '{}' in this revision", path)))?;
        Ok(contains_bytes(content, phrase.as_bytes()))
    }

    async fn materialize(&self, revision: &str, dest: &Path) -> Result<()> {
        self.materializations.fetch_add(1, Ordering::Relaxed);
        let commit = self.find(revision)?;
        let fail = |e: std::io::Error| MetricsError::materialization(revision, e);

        empty_dir(dest).await.map_err(fail)?;
        for (path, content) in &commit.files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(fail)?;
            }
            tokio::fs::write(&target, content).await.map_err(fail)?;
        }

        if commit.files.is_empty() {
            return Err(MetricsError::EmptyArchive {
                commit: revision.to_string(),
                dest: dest.to_path_buf(),
            });
        }
        Ok(())
    }
}
