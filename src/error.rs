//! Error taxonomy for metric computation
//!
//! Every variant aborts the enclosing batch: a caller receives either the
//! complete result sequence or exactly one of these.

use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to read commit log: {0}")]
    Oracle(String),

    #[error("Failed to materialize commit {commit}: {reason}")]
    Materialization { commit: String, reason: String },

    #[error("Archive of commit {commit} extracted no files into {}", dest.display())]
    EmptyArchive { commit: String, dest: PathBuf },

    #[error("Object lookup failed at {revision}: {reason}")]
    Lookup { revision: String, reason: String },
}

pub type Result<T, E = MetricsError> = std::result::Result<T, E>;

impl MetricsError {
    pub fn config(reason: impl Display) -> Self {
        Self::Configuration(reason.to_string())
    }

    pub fn oracle(reason: impl Display) -> Self {
        Self::Oracle(reason.to_string())
    }

    pub fn materialization(commit: &str, reason: impl Display) -> Self {
        Self::Materialization {
            commit: commit.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn lookup(revision: &str, reason: impl Display) -> Self {
        Self::Lookup {
            revision: revision.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<git2::Error> for MetricsError {
    fn from(err: git2::Error) -> Self {
        Self::Oracle(err.message().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_commit() {
        let err = MetricsError::materialization("abc123", "tar exited with 2");
        assert_eq!(
            err.to_string(),
            "Failed to materialize commit abc123: tar exited with 2"
        );

        let err = MetricsError::EmptyArchive {
            commit: "abc123".to_string(),
            dest: PathBuf::from("/tmp/x"),
        };
        assert!(err.to_string().contains("abc123"));
        assert!(err.to_string().contains("/tmp/x"));
    }
}
