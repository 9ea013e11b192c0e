//! Tree materialization
//!
//! Exports a commit's tree with `git archive` and unpacks it into a scratch
//! directory. The archive is built from the tree object, never the working
//! copy, so concurrent exports of different commits cannot interfere.
//!
//! `git archive` honours attributes committed in the tree (`export-ignore`
//! drops paths, `export-subst` and filters rewrite content). It is therefore
//! run against a scratch bare repository that borrows the source repository's
//! objects through `objects/info/alternates` and cancels those attributes in
//! its own `info/attributes`, which takes precedence over the tree's.

use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio::time::timeout;

use crate::error::{MetricsError, Result};

/// Archive container used between `git archive` and extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Tar,
    /// Stored (uncompressed) zip; needs `unzip`
    Zip,
}

impl ArchiveFormat {
    fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Zip => "zip",
        }
    }
}

/// Scratch directory layout for one repository:
/// `<root>/<repo>/archives/<hash>.<ext>`, `<root>/<repo>/checkouts/<hash>/`
/// and the export repository `<root>/<repo>/export.git`
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn new(scratch_root: &Path, repository_name: &str) -> Self {
        Self {
            root: scratch_root.join(repository_name),
        }
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.root.join("archives")
    }

    pub fn checkout_dir(&self, commit_hash: &str) -> PathBuf {
        self.root.join("checkouts").join(commit_hash)
    }

    pub fn export_git_dir(&self) -> PathBuf {
        self.root.join("export.git")
    }

    /// Clear the shared archive directory; done once per batch
    pub async fn prepare_batch(&self) -> Result<()> {
        let archives = self.archives_dir();
        empty_dir(&archives)
            .await
            .map_err(|e| MetricsError::materialization("(batch)", format!("cannot prepare {}: {}", archives.display(), e)))
    }
}

/// Cancels every attribute that changes what `git archive` writes
const EXPORT_OVERRIDES: &str = "* -export-ignore -export-subst -text -eol -filter -ident -working-tree-encoding\n";

/// Runs `git archive` + extract for one commit at a time
#[derive(Debug, Clone)]
pub struct TreeMaterializer {
    repo_path: PathBuf,
    archives_dir: PathBuf,
    export_git_dir: PathBuf,
    export_ready: OnceCell<()>,
    format: ArchiveFormat,
    deadline: Duration,
}

impl TreeMaterializer {
    pub fn new(repo_path: &Path, scratch: &ScratchSpace, format: ArchiveFormat, deadline: Duration) -> Self {
        Self {
            repo_path: repo_path.to_path_buf(),
            archives_dir: scratch.archives_dir(),
            export_git_dir: scratch.export_git_dir(),
            export_ready: OnceCell::new(),
            format,
            deadline,
        }
    }

    pub async fn materialize(&self, commit_hash: &str, dest: &Path) -> Result<()> {
        let start = Instant::now();
        let fail = |e: std::io::Error| MetricsError::materialization(commit_hash, e);

        empty_dir(dest).await.map_err(fail)?;
        tokio::fs::create_dir_all(&self.archives_dir).await.map_err(fail)?;

        let archive = self
            .archives_dir
            .join(format!("{}.{}", commit_hash, self.format.extension()));
        let format_arg = format!("--format={}", self.format.extension());
        let mut git_dir_arg = OsString::from("--git-dir=");
        git_dir_arg.push(self.export_repository(commit_hash).await?);

        let mut git_args: Vec<&OsStr> = vec![
            git_dir_arg.as_os_str(),
            OsStr::new("archive"),
            OsStr::new(&format_arg),
        ];
        if self.format == ArchiveFormat::Zip {
            git_args.push(OsStr::new("-0"));
        }
        git_args.extend([OsStr::new("-o"), archive.as_os_str(), OsStr::new(commit_hash)]);
        self.run_tool(commit_hash, "git", &git_args).await?;

        // A failed earlier attempt must not leave files behind
        empty_dir(dest).await.map_err(fail)?;

        let extracted = match self.format {
            ArchiveFormat::Tar => {
                let args = [OsStr::new("-xf"), archive.as_os_str(), OsStr::new("-C"), dest.as_os_str()];
                self.run_tool(commit_hash, "tar", &args).await
            }
            ArchiveFormat::Zip => {
                let args = [OsStr::new("-q"), OsStr::new("-o"), OsStr::new("-d"), dest.as_os_str(), archive.as_os_str()];
                self.run_tool(commit_hash, "unzip", &args).await
            }
        };

        if let Err(e) = tokio::fs::remove_file(&archive).await {
            tracing::debug!(archive = %archive.display(), error = %e, "could not remove archive");
        }
        extracted?;

        if dir_is_empty(dest).await.map_err(fail)? {
            return Err(MetricsError::EmptyArchive {
                commit: commit_hash.to_string(),
                dest: dest.to_path_buf(),
            });
        }

        tracing::debug!(commit = commit_hash, elapsed = ?start.elapsed(), "materialized tree");
        Ok(())
    }

    async fn export_repository(&self, commit_hash: &str) -> Result<&Path> {
        self.export_ready
            .get_or_try_init(|| self.init_export_git_dir(commit_hash))
            .await?;
        Ok(&self.export_git_dir)
    }

    async fn init_export_git_dir(&self, commit_hash: &str) -> Result<()> {
        let fail = |e: std::io::Error| MetricsError::materialization(commit_hash, e);

        let repo_path = self.repo_path.clone();
        let objects = tokio::task::spawn_blocking(move || {
            git2::Repository::open(&repo_path).map(|repo| repo.commondir().join("objects"))
        })
        .await
        .map_err(|e| MetricsError::materialization(commit_hash, format!("object directory lookup panicked: {}", e)))?
        .map_err(|e| MetricsError::materialization(commit_hash, e.message()))?;
        let objects = std::path::absolute(&objects).map_err(fail)?;

        empty_dir(&self.export_git_dir).await.map_err(fail)?;
        let init_args = [
            OsStr::new("init"),
            OsStr::new("--bare"),
            OsStr::new("-q"),
            self.export_git_dir.as_os_str(),
        ];
        self.run_tool(commit_hash, "git", &init_args).await?;

        let alternates = self.export_git_dir.join("objects").join("info");
        tokio::fs::create_dir_all(&alternates).await.map_err(fail)?;
        tokio::fs::write(alternates.join("alternates"), format!("{}\n", objects.display()))
            .await
            .map_err(fail)?;

        let info = self.export_git_dir.join("info");
        tokio::fs::create_dir_all(&info).await.map_err(fail)?;
        tokio::fs::write(info.join("attributes"), EXPORT_OVERRIDES)
            .await
            .map_err(fail)?;

        tracing::debug!(export = %self.export_git_dir.display(), objects = %objects.display(), "prepared export repository");
        Ok(())
    }

    async fn run_tool(&self, commit_hash: &str, program: &str, args: &[&OsStr]) -> Result<()> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MetricsError::materialization(commit_hash, format!("cannot run {}: {}", program, e)))?;

        match timeout(self.deadline, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(MetricsError::materialization(
                    commit_hash,
                    format!("{} exited with {}: {}", program, output.status, stderr.trim()),
                ))
            }
            Ok(Err(e)) => Err(MetricsError::materialization(commit_hash, format!("{} failed: {}", program, e))),
            Err(_) => Err(MetricsError::materialization(
                commit_hash,
                format!("{} did not finish within {:?}", program, self.deadline),
            )),
        }
    }
}

/// Remove everything under `path` and recreate it empty
pub async fn empty_dir(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(path).await
}

/// Remove a checkout once it has been measured
pub async fn discard_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove checkout"),
    }
}

async fn dir_is_empty(path: &Path) -> std::io::Result<bool> {
    let mut entries = tokio::fs::read_dir(path).await?;
    Ok(entries.next_entry().await?.is_none())
}
