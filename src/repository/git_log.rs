//! Commit log read through libgit2
//!
//! Walks first-parent history from HEAD and diffs each commit against its
//! first parent with rename and copy detection.

use std::path::{Path, PathBuf};
use std::time::Instant;

use git2::{Delta, DiffFindOptions, DiffOptions, ErrorCode, FileMode, Repository, Sort};

use crate::error::{MetricsError, Result};
use crate::model::{CommitDetails, FileStatus};
use crate::util::format_author_date;

use super::oracle::{CommitLogQuery, CommitOracle};

/// `CommitOracle` over the repository at a path
pub struct GitLogOracle {
    repo_path: PathBuf,
}

impl GitLogOracle {
    pub fn new(repo_path: &Path) -> Self {
        Self {
            repo_path: repo_path.to_path_buf(),
        }
    }
}

impl CommitOracle for GitLogOracle {
    async fn commit_log(&self, query: &CommitLogQuery) -> Result<Vec<CommitDetails>> {
        let repo_path = self.repo_path.clone();
        let query = query.clone();
        tokio::task::spawn_blocking(move || read_commit_log(&repo_path, &query))
            .await
            .map_err(|e| MetricsError::oracle(format!("commit log reader panicked: {}", e)))?
    }
}

/// Blocking commit log read, latest first
pub fn read_commit_log(repo_path: &Path, query: &CommitLogQuery) -> Result<Vec<CommitDetails>> {
    let start = Instant::now();
    let repo = Repository::open(repo_path).map_err(|e| {
        MetricsError::oracle(format!("cannot open repository {}: {}", repo_path.display(), e.message()))
    })?;

    if repo.head().is_err_and(|e| e.code() == ErrorCode::UnbornBranch) {
        tracing::debug!(repository = %repo_path.display(), "no commits yet");
        return Ok(Vec::new());
    }

    let mut revwalk = repo.revwalk()?;
    revwalk.push_head()?;
    revwalk.simplify_first_parent()?;
    revwalk.set_sorting(Sort::TOPOLOGICAL)?;

    if let Some(files) = query.files_argument() {
        tracing::debug!(files = %files, "filtering commit log by path");
    }

    let mut commits = Vec::new();
    for oid in revwalk {
        if query.is_full(commits.len()) {
            break;
        }
        let commit = repo.find_commit(oid?)?;
        if !query.within_window(commit.time().seconds()) {
            continue;
        }

        let details = describe_commit(&repo, &commit)?;
        if query.touches_filtered_path(&details) {
            commits.push(details);
        }
    }

    tracing::debug!(commits = commits.len(), elapsed = ?start.elapsed(), "read commit log");
    Ok(commits)
}

fn describe_commit(repo: &Repository, commit: &git2::Commit<'_>) -> Result<CommitDetails> {
    let parent = if commit.parent_count() > 0 {
        Some(commit.parent(0)?)
    } else {
        None
    };

    let new_tree = commit.tree()?;
    let old_tree = match &parent {
        Some(p) => Some(p.tree()?),
        None => None,
    };

    let mut diff_opts = DiffOptions::new();
    diff_opts.include_typechange(true).include_unmodified(true);
    let mut diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(&mut diff_opts))?;

    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true).copies(true).copies_from_unmodified(true);
    diff.find_similar(Some(&mut find_opts))?;

    let mut details = CommitDetails::new(commit.id().to_string());
    for delta in diff.deltas() {
        let new_path = delta.new_file().path().map(path_string);
        let old_path = delta.old_file().path().map(path_string);
        let old_is_submodule = delta.old_file().mode() == FileMode::Commit;
        let new_is_submodule = delta.new_file().mode() == FileMode::Commit;

        // Submodules are not files; only the file side of a swap is a change
        let (status, path) = match (delta.status(), old_is_submodule, new_is_submodule) {
            (Delta::Unmodified | Delta::Ignored | Delta::Untracked, _, _) => continue,
            (_, true, true) | (Delta::Deleted, true, _) | (Delta::Added, _, true) => continue,
            (_, true, false) => (FileStatus::Added, new_path),
            (_, false, true) => (FileStatus::Deleted, old_path),
            (status, false, false) => match status {
                Delta::Added => (FileStatus::Added, new_path),
                Delta::Deleted => (FileStatus::Deleted, old_path),
                Delta::Modified => (FileStatus::Modified, new_path),
                Delta::Typechange => (FileStatus::TypeChanged, new_path),
                Delta::Renamed => match old_path {
                    Some(from) => (FileStatus::Renamed { from }, new_path),
                    None => (FileStatus::Added, new_path),
                },
                Delta::Copied => match old_path {
                    Some(from) => (FileStatus::Copied { from }, new_path),
                    None => (FileStatus::Added, new_path),
                },
                other => {
                    return Err(MetricsError::oracle(format!(
                        "commit {} has an unexpected change kind {:?}",
                        commit.id(),
                        other
                    )));
                }
            },
        };
        let path = path.ok_or_else(|| {
            MetricsError::oracle(format!("commit {} has a change without a path", commit.id()))
        })?;
        details.push_change(status, path);
    }

    let author = commit.author();
    let when = author.when();
    details.parent = parent.map(|p| p.id().to_string());
    details.subject = commit.summary().unwrap_or_default().to_string();
    details.author_name = author.name().unwrap_or_default().to_string();
    details.author_email = author.email().unwrap_or_default().to_string();
    details.author_date = format_author_date(when.seconds(), when.offset_minutes());
    Ok(details)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
