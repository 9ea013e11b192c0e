use std::fmt;
use std::path::PathBuf;

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::error::{MetricsError, Result};

/// How one path changed in a commit, relative to the commit's first parent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FileStatus {
    Added,
    Deleted,
    Modified,
    /// Same path, different entry type (e.g. file replaced by a symlink)
    TypeChanged,
    /// The paired path is the destination; `from` is the old path
    Renamed { from: String },
    /// The paired path is the new copy; `from` is left untouched
    Copied { from: String },
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => f.write_str("A"),
            FileStatus::Deleted => f.write_str("D"),
            FileStatus::Modified => f.write_str("M"),
            FileStatus::TypeChanged => f.write_str("T"),
            FileStatus::Renamed { from } => write!(f, "R {}", from),
            FileStatus::Copied { from } => write!(f, "C {}", from),
        }
    }
}

/// One path's presence before and after a commit.
///
/// A rename splits into two of these: the old path disappears, the new one
/// appears. A copy only makes its destination appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTransition<'a> {
    pub path: &'a str,
    pub existed_before: bool,
    pub exists_after: bool,
}

/// A commit as reported by the commit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitDetails {
    pub hash: String,
    /// First parent the status list was computed against
    pub parent: Option<String>,
    pub subject: String,
    pub author_name: String,
    pub author_date: String,
    pub author_email: String,
    status: Vec<FileStatus>,
    files: Vec<String>,
}

impl CommitDetails {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            parent: None,
            subject: String::new(),
            author_name: String::new(),
            author_date: String::new(),
            author_email: String::new(),
            status: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Build from parallel status/file lists; `status[i]` describes `files[i]`
    pub fn with_changes(mut self, status: Vec<FileStatus>, files: Vec<String>) -> Result<Self> {
        if status.len() != files.len() {
            return Err(MetricsError::oracle(format!(
                "commit {} has {} status entries for {} files",
                self.hash,
                status.len(),
                files.len()
            )));
        }
        self.status = status;
        self.files = files;
        Ok(self)
    }

    pub fn push_change(&mut self, status: FileStatus, path: impl Into<String>) {
        self.status.push(status);
        self.files.push(path.into());
    }

    pub fn status(&self) -> &[FileStatus] {
        &self.status
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn changes(&self) -> impl Iterator<Item = (&FileStatus, &str)> {
        self.status.iter().zip(self.files.iter().map(String::as_str))
    }

    /// Whether anything other than in-place content edits happened
    pub fn has_non_modify_change(&self) -> bool {
        self.status.iter().any(|s| *s != FileStatus::Modified)
    }

    /// Every path this commit touched, including rename and copy sources
    pub fn touched_paths(&self) -> impl Iterator<Item = &str> {
        self.changes().flat_map(|(status, path)| {
            let source = match status {
                FileStatus::Renamed { from } | FileStatus::Copied { from } => Some(from.as_str()),
                _ => None,
            };
            std::iter::once(path).chain(source)
        })
    }

    pub fn transitions(&self) -> Vec<PathTransition<'_>> {
        let mut out = Vec::with_capacity(self.files.len());
        for (status, path) in self.changes() {
            match status {
                FileStatus::Added | FileStatus::Copied { .. } => {
                    out.push(PathTransition { path, existed_before: false, exists_after: true });
                }
                FileStatus::Deleted => {
                    out.push(PathTransition { path, existed_before: true, exists_after: false });
                }
                FileStatus::Modified | FileStatus::TypeChanged => {
                    out.push(PathTransition { path, existed_before: true, exists_after: true });
                }
                FileStatus::Renamed { from } => {
                    out.push(PathTransition { path: from, existed_before: true, exists_after: false });
                    out.push(PathTransition { path, existed_before: false, exists_after: true });
                }
            }
        }
        out
    }

    /// Reject change lists the differential walk cannot apply unambiguously
    pub fn validate(&self) -> Result<()> {
        if self.status.len() != self.files.len() {
            return Err(MetricsError::lookup(&self.hash, "status and file lists differ in length"));
        }
        let mut rename_sources = FxHashSet::default();
        for status in &self.status {
            if let FileStatus::Renamed { from } = status {
                if !rename_sources.insert(from.as_str()) {
                    return Err(MetricsError::lookup(
                        &self.hash,
                        format!("ambiguous rename: '{}' is the source of several renames", from),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(8)]
    }
}

/// A commit whose tree has been exported to a scratch directory
#[derive(Debug, Clone)]
pub struct CommitSnapshot<'a> {
    pub commit: &'a CommitDetails,
    pub clone_destination: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renamed(from: &str) -> FileStatus {
        FileStatus::Renamed { from: from.to_string() }
    }

    #[test]
    fn test_length_invariant() {
        let err = CommitDetails::new("c1")
            .with_changes(vec![FileStatus::Added], vec![])
            .unwrap_err();
        assert!(matches!(err, MetricsError::Oracle(_)));
    }

    #[test]
    fn test_rename_splits_into_two_transitions() {
        let commit = CommitDetails::new("c1")
            .with_changes(vec![renamed("a.ts")], vec!["a.txt".to_string()])
            .unwrap();
        let transitions = commit.transitions();
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0], PathTransition { path: "a.ts", existed_before: true, exists_after: false });
        assert_eq!(transitions[1], PathTransition { path: "a.txt", existed_before: false, exists_after: true });
    }

    #[test]
    fn test_copy_only_adds_destination() {
        let mut commit = CommitDetails::new("c1");
        commit.push_change(FileStatus::Copied { from: "lib.ts".to_string() }, "lib2.ts");
        assert_eq!(
            commit.transitions(),
            vec![PathTransition { path: "lib2.ts", existed_before: false, exists_after: true }]
        );
        let touched: Vec<_> = commit.touched_paths().collect();
        assert_eq!(touched, vec!["lib2.ts", "lib.ts"]);
    }

    #[test]
    fn test_modified_only_detection() {
        let mut commit = CommitDetails::new("c1");
        assert!(!commit.has_non_modify_change());
        commit.push_change(FileStatus::Modified, "a.ts");
        assert!(!commit.has_non_modify_change());
        commit.push_change(FileStatus::Added, "b.ts");
        assert!(commit.has_non_modify_change());
    }

    #[test]
    fn test_ambiguous_rename_is_flagged() {
        let mut commit = CommitDetails::new("c1");
        commit.push_change(renamed("a.ts"), "b.ts");
        commit.push_change(renamed("a.ts"), "c.ts");
        let err = commit.validate().unwrap_err();
        assert!(matches!(err, MetricsError::Lookup { .. }));
        assert!(err.to_string().contains("ambiguous rename"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(FileStatus::Added.to_string(), "A");
        assert_eq!(renamed("old.ts").to_string(), "R old.ts");
    }
}
