//! Backend trait definitions.
//!
//! The cache never talks to git directly. Everything it needs from version
//! control goes through [`GitBackend`], so tests can script the data source.

use crate::message::HostInfo;
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// What the backend knows about a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// Working tree root.
    pub root: PathBuf,
    /// `user.email` from the repository configuration.
    pub user_email: Option<String>,
    /// Hosting information derived from the `origin` remote.
    pub host: Option<HostInfo>,
}

/// Options for one attribution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlameOptions {
    /// Ignore whitespace-only changes (`-w`).
    pub ignore_whitespace: bool,
}

/// How the attribution subprocess exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlameExit {
    /// Exit code 0.
    Success,
    /// The path is not under version control.
    Untracked,
    /// Any other exit.
    Failed {
        code: Option<i32>,
        stderr: String,
    },
}

/// Line-by-line output of one attribution run.
#[async_trait]
pub trait AttributionStream: Send {
    /// Next line of output, or `None` at end of stream.
    async fn next_line(&mut self) -> Result<Option<String>>;

    /// Wait for the subprocess and classify its exit.
    async fn finish(self: Box<Self>) -> Result<BlameExit>;
}

/// Version control operations the cache depends on.
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Find the repository containing `path`, if any.
    async fn discover(&self, path: &Path) -> Result<Option<RepoInfo>>;

    /// Current head revision id; `None` for an unborn branch.
    async fn head(&self, root: &Path) -> Result<Option<String>>;

    /// Start an attribution run for `path`.
    async fn blame(
        &self,
        root: &Path,
        path: &Path,
        options: BlameOptions,
    ) -> Result<Box<dyn AttributionStream>>;

    /// Full raw message of a revision.
    async fn commit_message(&self, root: &Path, revision: &str) -> Result<String>;

    /// Whether version control tracks `path`.
    async fn is_tracked(&self, root: &Path, path: &Path) -> Result<bool>;
}
