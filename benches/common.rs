// Shared benchmark helpers
#![allow(dead_code)]

use git2::{Repository, Signature};
use repometrics::repository::MemoryRepository;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary git repository for benchmarks
pub fn create_bench_repo() -> (TempDir, PathBuf, Repository) {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().join("bench-project");
    let repo = Repository::init(&repo_path).unwrap();

    // Configure git user for commits
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Bench User").unwrap();
    config.set_str("user.email", "bench@example.com").unwrap();

    (dir, repo_path, repo)
}

/// Write files and create a commit
pub fn add_commit(repo: &Repository, files: &[(String, Vec<u8>)], message: &str) -> git2::Oid {
    let sig = Signature::now("Bench User", "bench@example.com").unwrap();
    let mut index = repo.index().unwrap();

    for (path, content) in files {
        let full_path = repo.workdir().unwrap().join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full_path, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }

    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());

    if let Some(parent) = parent {
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent]).unwrap()
    } else {
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[]).unwrap()
    }
}

fn file_path(i: usize) -> String {
    let ext = if i % 3 == 0 { "ts" } else { "js" };
    format!("src/dir_{}/file_{}.{}", i % 20, i, ext)
}

fn file_content(i: usize, version: usize) -> Vec<u8> {
    let marker = if (i + version) % 4 == 0 { "// TODO revisit\n" } else { "" };
    format!("{}export function func_{}() {{ return {}; }}\n", marker, i, version).into_bytes()
}

/// A repository with `num_files` files, then `num_commits - 1` commits each
/// editing `edits_per_commit` of them
pub fn build_bench_history(repo: &Repository, num_files: usize, num_commits: usize, edits_per_commit: usize) {
    let initial: Vec<_> = (0..num_files).map(|i| (file_path(i), file_content(i, 0))).collect();
    add_commit(repo, &initial, "Initial commit");

    for version in 1..num_commits {
        let edits: Vec<_> = (0..edits_per_commit)
            .map(|k| {
                let i = (version * edits_per_commit + k) % num_files;
                (file_path(i), file_content(i, version))
            })
            .collect();
        add_commit(repo, &edits, &format!("Commit {}", version));
    }
}

/// The same history shape in memory
pub fn build_memory_history(num_files: usize, num_commits: usize, edits_per_commit: usize) -> MemoryRepository {
    let mut repo = MemoryRepository::new();
    let mut builder = repo.commit("Initial commit");
    for i in 0..num_files {
        builder = builder.create(&file_path(i), &String::from_utf8_lossy(&file_content(i, 0)));
    }
    builder.finish();

    for version in 1..num_commits {
        let mut builder = repo.commit(&format!("Commit {}", version));
        for k in 0..edits_per_commit {
            let i = (version * edits_per_commit + k) % num_files;
            builder = builder.modify(&file_path(i), &String::from_utf8_lossy(&file_content(i, version)));
        }
        builder.finish();
    }
    repo
}
