// Object store tests
// Materialization and tree queries against real (temporary) git repositories

mod common;

use std::time::Duration;

use common::{commit_changes, config_for, Changes};
use repometrics::error::MetricsError;
use repometrics::measure::list_checkout_files;
use repometrics::repository::{ArchiveFormat, GitObjectStore, ObjectStore, ScratchSpace, TreeMaterializer};
use repometrics::util::GlobMatcher;

fn tool_available(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("-v")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok()
}

#[tokio::test]
async fn test_materializes_exact_commit_tree() {
    let (dir, repo_path, repo) = common::create_test_repo();
    let first = commit_changes(
        &repo,
        Changes::new().write("src/a.ts", b"aaa").write("b.txt", b"bbb"),
        "first",
    );
    commit_changes(&repo, Changes::new().remove("b.txt").write("c.ts", b"ccc"), "second");

    let settings = config_for(&dir, &repo_path).resolve().unwrap();
    let store = GitObjectStore::open(&settings).unwrap();
    let dest = settings.scratch().checkout_dir(&first.to_string());

    store.materialize(&first.to_string(), &dest).await.unwrap();

    let files = list_checkout_files(&dest, "first").await.unwrap();
    assert_eq!(files, vec!["b.txt", "src/a.ts"]);
    assert_eq!(std::fs::read(dest.join("src/a.ts")).unwrap(), b"aaa");
    assert!(std::fs::read_dir(settings.scratch().archives_dir()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_materialize_ignores_export_attributes() {
    let (dir, repo_path, repo) = common::create_test_repo();
    let commit = commit_changes(
        &repo,
        Changes::new()
            .write(".gitattributes", b"tests/** export-ignore\n*.ts export-subst\n")
            .write("a.ts", b"'$Format:%H$'\n")
            .write("tests/b.ts", b"bbb"),
        "first",
    );

    let settings = config_for(&dir, &repo_path).resolve().unwrap();
    let store = GitObjectStore::open(&settings).unwrap();
    let dest = settings.scratch().checkout_dir(&commit.to_string());

    store.materialize(&commit.to_string(), &dest).await.unwrap();

    let files = list_checkout_files(&dest, "first").await.unwrap();
    assert_eq!(files, vec![".gitattributes", "a.ts", "tests/b.ts"]);
    assert_eq!(std::fs::read(dest.join("a.ts")).unwrap(), b"'$Format:%H$'\n");
    // The measured repository itself is left alone
    assert!(!repo_path.join(".git/info/attributes").exists());
    assert!(settings.scratch().export_git_dir().join("info/attributes").exists());
}

#[tokio::test]
async fn test_materialize_replaces_stale_content() {
    let (dir, repo_path, repo) = common::create_test_repo();
    let commit = commit_changes(&repo, Changes::new().write("a.ts", b"aaa"), "first");

    let settings = config_for(&dir, &repo_path).resolve().unwrap();
    let store = GitObjectStore::open(&settings).unwrap();
    let dest = settings.scratch().checkout_dir(&commit.to_string());
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("stale.ts"), b"left over").unwrap();

    store.materialize(&commit.to_string(), &dest).await.unwrap();

    assert_eq!(list_checkout_files(&dest, "first").await.unwrap(), vec!["a.ts"]);
}

#[tokio::test]
async fn test_zip_archive_format() {
    if !tool_available("unzip") {
        eprintln!("unzip not installed, skipping");
        return;
    }
    let (dir, repo_path, repo) = common::create_test_repo();
    let commit = commit_changes(&repo, Changes::new().write("dir/a.ts", b"aaa"), "first");

    let scratch = ScratchSpace::new(&dir.path().join("scratch"), "project");
    let materializer = TreeMaterializer::new(&repo_path, &scratch, ArchiveFormat::Zip, Duration::from_secs(60));
    let dest = scratch.checkout_dir(&commit.to_string());

    materializer.materialize(&commit.to_string(), &dest).await.unwrap();

    assert_eq!(list_checkout_files(&dest, "first").await.unwrap(), vec!["dir/a.ts"]);
}

#[tokio::test]
async fn test_empty_tree_is_empty_archive_error() {
    let (dir, repo_path, repo) = common::create_test_repo();
    commit_changes(&repo, Changes::new().write("a.ts", b"aaa"), "first");
    let empty = commit_changes(&repo, Changes::new().remove("a.ts"), "remove everything");

    let settings = config_for(&dir, &repo_path).resolve().unwrap();
    let store = GitObjectStore::open(&settings).unwrap();
    let dest = settings.scratch().checkout_dir(&empty.to_string());

    let err = store.materialize(&empty.to_string(), &dest).await.unwrap_err();

    assert!(matches!(err, MetricsError::EmptyArchive { .. }), "{}", err);
}

#[tokio::test]
async fn test_unknown_revision_is_materialization_error() {
    let (dir, repo_path, repo) = common::create_test_repo();
    commit_changes(&repo, Changes::new().write("a.ts", b"aaa"), "first");

    let settings = config_for(&dir, &repo_path).resolve().unwrap();
    let store = GitObjectStore::open(&settings).unwrap();
    let dest = settings.scratch().checkout_dir("missing");

    let err = store
        .materialize("0000000000000000000000000000000000000001", &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, MetricsError::Materialization { .. }));
}

#[tokio::test]
async fn test_tree_queries() {
    let (dir, repo_path, repo) = common::create_test_repo();
    let first = commit_changes(
        &repo,
        Changes::new()
            .write("src/a.ts", b"const marker = 'aaa';")
            .write("src/deep/b.ts", b"nothing here")
            .write("notes.md", b"aaa"),
        "first",
    )
    .to_string();

    let settings = config_for(&dir, &repo_path).resolve().unwrap();
    let store = GitObjectStore::open(&settings).unwrap();

    let ts = GlobMatcher::compile(&["**.ts"]).unwrap();
    assert_eq!(store.list_paths(&first, &ts).await.unwrap(), vec!["src/a.ts", "src/deep/b.ts"]);
    let everything = GlobMatcher::compile(&["*"]).unwrap();
    assert_eq!(store.list_paths(&first, &everything).await.unwrap().len(), 3);

    assert!(store.phrase_contains(&first, "src/a.ts", "aaa").await.unwrap());
    assert!(!store.phrase_contains(&first, "src/deep/b.ts", "aaa").await.unwrap());

    let err = store.phrase_contains(&first, "src/missing.ts", "aaa").await.unwrap_err();
    assert!(matches!(err, MetricsError::Lookup { .. }));
    let err = store.phrase_contains(&first, "src", "aaa").await.unwrap_err();
    assert!(matches!(err, MetricsError::Lookup { .. }));
}

#[tokio::test]
async fn test_open_rejects_non_repository() {
    let dir = tempfile::TempDir::new().unwrap();
    let settings = config_for(&dir, dir.path()).resolve().unwrap();

    assert!(matches!(
        GitObjectStore::open(&settings),
        Err(MetricsError::Configuration(_))
    ));
}
