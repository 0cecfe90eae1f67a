//! [`GitBackend`] implementation over libgit2 and the git command line.

use crate::blame::GitBlameStream;
use crate::commit;
use crate::repository::{relative_to, GitError, GitRepository};
use async_trait::async_trait;
use linetrace_core::backend::{AttributionStream, BlameOptions, GitBackend, RepoInfo};
use linetrace_core::{BlameConfig, Result};
use std::path::{Path, PathBuf};

/// Production backend.
///
/// Repository metadata comes from libgit2 on the blocking pool. Attribution,
/// commit messages and the tracked probe run the git binary.
#[derive(Debug, Clone)]
pub struct GitCliBackend {
    git_binary: String,
    untracked_exit_code: i32,
}

impl GitCliBackend {
    pub fn new(config: &BlameConfig) -> Self {
        Self {
            git_binary: config.git_binary.clone(),
            untracked_exit_code: config.untracked_exit_code,
        }
    }
}

impl Default for GitCliBackend {
    fn default() -> Self {
        Self::new(&BlameConfig::default())
    }
}

/// Run a libgit2 operation on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, GitError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GitError::Task(e.to_string()))?
        .map_err(Into::into)
}

#[async_trait]
impl GitBackend for GitCliBackend {
    async fn discover(&self, path: &Path) -> Result<Option<RepoInfo>> {
        let path = path.to_path_buf();
        blocking(move || Ok(GitRepository::discover(&path)?.map(|repo| repo.info()))).await
    }

    async fn head(&self, root: &Path) -> Result<Option<String>> {
        let root = root.to_path_buf();
        blocking(move || GitRepository::open(&root)?.head_id()).await
    }

    async fn blame(
        &self,
        root: &Path,
        path: &Path,
        options: BlameOptions,
    ) -> Result<Box<dyn AttributionStream>> {
        let relative: PathBuf = relative_to(root, path)?;
        let stream = GitBlameStream::spawn(
            &self.git_binary,
            root,
            &relative,
            options,
            self.untracked_exit_code,
        )?;
        Ok(Box::new(stream))
    }

    async fn commit_message(&self, root: &Path, revision: &str) -> Result<String> {
        Ok(commit::show_message(&self.git_binary, root, revision).await?)
    }

    async fn is_tracked(&self, root: &Path, path: &Path) -> Result<bool> {
        let relative = relative_to(root, path)?;
        Ok(commit::is_tracked(&self.git_binary, root, &relative).await?)
    }
}
