//! Git repository wrapper.

use git2::{ErrorCode, Repository};
use linetrace_core::backend::RepoInfo;
use linetrace_core::message::HostInfo;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Path {0} is outside the working tree")]
    OutsideWorkTree(PathBuf),

    #[error("Invalid revision: {0}")]
    InvalidRevision(String),

    #[error("git {command} exited with {code:?}: {stderr}")]
    Command {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Result type for git operations.
pub type Result<T> = std::result::Result<T, GitError>;

impl From<GitError> for linetrace_core::Error {
    fn from(e: GitError) -> Self {
        match e {
            GitError::Io(e) => linetrace_core::Error::Io(e),
            other => linetrace_core::Error::Git(other.to_string()),
        }
    }
}

/// Wrapper around a non-bare git repository.
pub struct GitRepository {
    repo: Repository,
    root: PathBuf,
}

impl GitRepository {
    /// Open the repository containing `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::discover(path)?.ok_or_else(|| GitError::NotARepository(path.to_path_buf()))
    }

    /// Find the repository containing `path`, which may be a file that does
    /// not exist yet. Bare repositories are ignored.
    pub fn discover(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let start = if path.is_dir() {
            path
        } else {
            path.parent().unwrap_or(path)
        };

        let repo = match Repository::discover(start) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let root = match repo.workdir() {
            Some(workdir) => normalize(workdir),
            None => return Ok(None),
        };
        Ok(Some(Self { repo, root }))
    }

    /// Working tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Head commit id, or `None` on an unborn branch.
    pub fn head_id(&self) -> Result<Option<String>> {
        match self.repo.head() {
            Ok(head) => Ok(head.target().map(|oid| oid.to_string())),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// `user.email` from the effective configuration.
    pub fn user_email(&self) -> Option<String> {
        self.repo
            .config()
            .ok()?
            .get_string("user.email")
            .ok()
            .filter(|email| !email.trim().is_empty())
    }

    /// Hosting information derived from the `origin` remote.
    pub fn host(&self) -> Option<HostInfo> {
        let remote = self.repo.find_remote("origin").ok()?;
        HostInfo::from_remote_url(remote.url()?)
    }

    /// Everything the cache needs to open a session.
    pub fn info(&self) -> RepoInfo {
        RepoInfo {
            root: self.root.clone(),
            user_email: self.user_email(),
            host: self.host(),
        }
    }
}

/// `path` relative to `root`, resolving symlinks if a plain prefix match fails.
pub fn relative_to(root: &Path, path: &Path) -> Result<PathBuf> {
    if let Ok(relative) = path.strip_prefix(root) {
        return Ok(relative.to_path_buf());
    }
    let resolved = path
        .parent()
        .and_then(|parent| parent.canonicalize().ok())
        .zip(path.file_name())
        .map(|(parent, name)| parent.join(name));
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    resolved
        .as_deref()
        .and_then(|p| p.strip_prefix(&root).ok())
        .map(Path::to_path_buf)
        .ok_or_else(|| GitError::OutsideWorkTree(path.to_path_buf()))
}

fn normalize(path: &Path) -> PathBuf {
    let path: PathBuf = path.components().collect();
    path.canonicalize().unwrap_or(path)
}
