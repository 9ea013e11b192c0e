//! Object store over a real repository
//!
//! Tree queries go through gix in-process; materialization shells out to
//! `git archive`.

use std::path::{Path, PathBuf};

use crate::config::MetricsSettings;
use crate::error::{MetricsError, Result};
use crate::util::GlobMatcher;

use super::materialize::TreeMaterializer;
use super::port::ObjectStore;
use super::tree_walk::TreeWalker;

/// `ObjectStore` backed by the repository at `repository_path`
pub struct GitObjectStore {
    repo: gix::ThreadSafeRepository,
    repo_path: PathBuf,
    materializer: TreeMaterializer,
}

impl GitObjectStore {
    pub fn open(settings: &MetricsSettings) -> Result<Self> {
        let materializer = TreeMaterializer::new(
            settings.repository_path(),
            settings.scratch(),
            settings.archive_format(),
            settings.subprocess_timeout(),
        );
        Self::with_materializer(settings.repository_path(), materializer)
    }

    pub fn with_materializer(repo_path: &Path, materializer: TreeMaterializer) -> Result<Self> {
        let repo = gix::open(repo_path)
            .map_err(|e| MetricsError::config(format!("cannot open repository {}: {}", repo_path.display(), e)))?
            .into_sync();
        Ok(Self {
            repo,
            repo_path: repo_path.to_path_buf(),
            materializer,
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Run a tree query on the blocking pool against a thread-local handle
    async fn with_walker<T, F>(&self, revision: &str, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut TreeWalker<'_, gix::OdbHandle>) -> Result<T> + Send + 'static,
    {
        let repo = self.repo.clone();
        let revision = revision.to_string();
        let failed_revision = revision.clone();
        tokio::task::spawn_blocking(move || {
            let repo = repo.to_thread_local();
            let odb = repo.objects.clone();
            let mut walker = TreeWalker::new(&odb, &revision);
            query(&mut walker)
        })
        .await
        .map_err(|e| MetricsError::lookup(&failed_revision, format!("tree query panicked: {}", e)))?
    }
}

impl ObjectStore for GitObjectStore {
    async fn list_paths(&self, revision: &str, matcher: &GlobMatcher) -> Result<Vec<String>> {
        let matcher = matcher.clone();
        self.with_walker(revision, move |walker| walker.collect_files(&matcher))
            .await
    }

    async fn phrase_contains(&self, revision: &str, path: &str, phrase: &str) -> Result<bool> {
        let path = path.to_string();
        let phrase = phrase.to_string();
        let rev = revision.to_string();
        self.with_walker(revision, move |walker| match walker.resolve_file(&path)? {
            Some(oid) => walker.blob_contains(oid, &phrase),
            None => Err(MetricsError::lookup(&rev, format!("no file '{}' in this revision", path))),
        })
        .await
    }

    async fn materialize(&self, revision: &str, dest: &Path) -> Result<()> {
        self.materializer.materialize(revision, dest).await
    }
}
