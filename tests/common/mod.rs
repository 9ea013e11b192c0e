// Shared test fixtures for integration tests
// Functions here are used across different test files
#![allow(dead_code)]

use git2::{Repository, Signature, Time};
use repometrics::config::MetricsConfig;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary git repository with no commits
pub fn create_test_repo() -> (TempDir, PathBuf, Repository) {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().join("project");
    let repo = Repository::init(&repo_path).unwrap();

    // Configure git user for commits
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();

    (dir, repo_path, repo)
}

/// Configuration for `repo_path` with a scratch root inside the test's temp dir
pub fn config_for(dir: &TempDir, repo_path: &Path) -> MetricsConfig {
    MetricsConfig {
        scratch_root: Some(dir.path().join("scratch")),
        ..MetricsConfig::new(repo_path)
    }
}

/// Content long enough for rename detection to pair edited files
pub fn file_content(path: &str) -> Vec<u8> {
    let mut content = format!("// created as {}\n", path);
    for i in 0..12 {
        content.push_str(&format!("export const value{} = {};\n", i, i));
    }
    content.into_bytes()
}

/// File operations making up one commit
#[derive(Default)]
pub struct Changes {
    writes: Vec<(String, Vec<u8>)>,
    removes: Vec<String>,
    renames: Vec<(String, String, Option<Vec<u8>>)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, path: &str) -> Self {
        self.writes.push((path.to_string(), file_content(path)));
        self
    }

    pub fn write(mut self, path: &str, content: &[u8]) -> Self {
        self.writes.push((path.to_string(), content.to_vec()));
        self
    }

    /// Append a line to an existing file
    pub fn modify(mut self, repo: &Repository, path: &str) -> Self {
        let full_path = repo.workdir().unwrap().join(path);
        let mut content = std::fs::read(&full_path).unwrap();
        content.extend_from_slice(format!("// modified {}\n", self.writes.len()).as_bytes());
        self.writes.push((path.to_string(), content));
        self
    }

    pub fn remove(mut self, path: &str) -> Self {
        self.removes.push(path.to_string());
        self
    }

    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.renames.push((from.to_string(), to.to_string(), None));
        self
    }

    /// Rename and append a line in the same commit
    pub fn rename_modified(mut self, repo: &Repository, from: &str, to: &str) -> Self {
        let full_path = repo.workdir().unwrap().join(from);
        let mut content = std::fs::read(&full_path).unwrap();
        content.extend_from_slice(b"// touched while renaming\n");
        self.renames.push((from.to_string(), to.to_string(), Some(content)));
        self
    }
}

/// Apply `changes` and commit them with the current time
pub fn commit_changes(repo: &Repository, changes: Changes, message: &str) -> git2::Oid {
    let sig = Signature::now("Test User", "test@example.com").unwrap();
    commit_with_signature(repo, changes, message, &sig)
}

/// Apply `changes` and commit them at `seconds` (UTC)
pub fn commit_at(repo: &Repository, changes: Changes, message: &str, seconds: i64) -> git2::Oid {
    let sig = Signature::new("Test User", "test@example.com", &Time::new(seconds, 0)).unwrap();
    commit_with_signature(repo, changes, message, &sig)
}

fn commit_with_signature(repo: &Repository, changes: Changes, message: &str, sig: &Signature<'_>) -> git2::Oid {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();

    for (path, content) in &changes.writes {
        let full_path = workdir.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full_path, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }

    for path in &changes.removes {
        std::fs::remove_file(workdir.join(path)).unwrap();
        index.remove_path(Path::new(path)).unwrap();
    }

    for (from, to, content) in &changes.renames {
        let target = workdir.join(to);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::rename(workdir.join(from), &target).unwrap();
        if let Some(content) = content {
            std::fs::write(&target, content).unwrap();
        }
        index.remove_path(Path::new(from)).unwrap();
        index.add_path(Path::new(to)).unwrap();
    }

    commit_index(repo, &mut index, message, sig)
}

fn commit_index(repo: &Repository, index: &mut git2::Index, message: &str, sig: &Signature<'_>) -> git2::Oid {
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    // Get parent commit if exists
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());

    if let Some(parent) = parent {
        repo.commit(Some("HEAD"), sig, sig, message, &tree, &[&parent]).unwrap()
    } else {
        repo.commit(Some("HEAD"), sig, sig, message, &tree, &[]).unwrap()
    }
}

/// Record a submodule entry (mode 160000) at `path` pointing at `target`,
/// replacing whatever the index had there, and commit it
pub fn commit_submodule(repo: &Repository, path: &str, target: git2::Oid, message: &str) -> git2::Oid {
    let sig = Signature::now("Test User", "test@example.com").unwrap();
    let mut index = repo.index().unwrap();
    let entry = git2::IndexEntry {
        ctime: git2::IndexTime::new(0, 0),
        mtime: git2::IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o160000,
        uid: 0,
        gid: 0,
        file_size: 0,
        id: target,
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    };
    index.add(&entry).unwrap();
    commit_index(repo, &mut index, message, &sig)
}

/// Add files with explicit content and commit them
pub fn add_commit(repo: &Repository, files: &[(&str, &[u8])], message: &str) -> git2::Oid {
    let changes = files
        .iter()
        .fold(Changes::new(), |changes, (path, content)| changes.write(path, content));
    commit_changes(repo, changes, message)
}

/// Remove a file from the repository and create a commit
pub fn remove_file_commit(repo: &Repository, path: &str, message: &str) -> git2::Oid {
    commit_changes(repo, Changes::new().remove(path), message)
}

/// The three-commit rename history: six files created, then renamed within
/// and across extensions
pub fn build_rename_history(repo: &Repository) {
    commit_changes(
        repo,
        Changes::new()
            .create("file1.tsx")
            .create("file2.ts")
            .create("file3.ts")
            .create("file4.txt")
            .create("file5.txt")
            .create("file6.ts"),
        "create six files",
    );
    commit_changes(
        repo,
        Changes::new()
            .modify(repo, "file1.tsx")
            .rename("file2.ts", "file2.something")
            .rename("file3.ts", "file3_renamed.ts"),
        "rename two",
    );
    commit_changes(
        repo,
        Changes::new()
            .modify(repo, "file4.txt")
            .rename_modified(repo, "file2.something", "file2.ts")
            .rename("file3_renamed.ts", "file3_renamed_again.ts")
            .rename("file6.ts", "file6.txt"),
        "rename three",
    );
}
