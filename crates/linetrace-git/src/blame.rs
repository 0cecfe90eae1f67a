//! Streaming `git blame --incremental` subprocess.

use crate::repository::{GitError, Result};
use async_trait::async_trait;
use linetrace_core::backend::{AttributionStream, BlameExit, BlameOptions};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Running attribution subprocess for one file.
///
/// Output is read line by line as the tool produces it. Dropping the stream
/// kills the child.
pub struct GitBlameStream {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: JoinHandle<String>,
    untracked_exit_code: i32,
    buf: Vec<u8>,
}

impl GitBlameStream {
    /// Spawn `git blame --incremental` for `relative_path` inside `root`.
    pub fn spawn(
        git_binary: &str,
        root: &Path,
        relative_path: &Path,
        options: BlameOptions,
        untracked_exit_code: i32,
    ) -> Result<Self> {
        let mut cmd = Command::new(git_binary);
        cmd.current_dir(root).arg("blame").arg("--incremental");
        if options.ignore_whitespace {
            cmd.arg("-w");
        }
        cmd.arg("--")
            .arg(relative_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            root = %root.display(),
            path = %relative_path.display(),
            ignore_whitespace = options.ignore_whitespace,
            "Spawning git blame"
        );
        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GitError::Task("blame stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| GitError::Task("blame stderr not captured".to_string()))?;

        let stderr = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut bytes = Vec::new();
            if let Err(e) = reader.read_to_end(&mut bytes).await {
                tracing::debug!(error = %e, "Failed to read blame stderr");
            }
            String::from_utf8_lossy(&bytes).into_owned()
        });

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            stderr,
            untracked_exit_code,
            buf: Vec::new(),
        })
    }
}

#[async_trait]
impl AttributionStream for GitBlameStream {
    async fn next_line(&mut self) -> linetrace_core::Result<Option<String>> {
        self.buf.clear();
        let read = self.stdout.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    async fn finish(mut self: Box<Self>) -> linetrace_core::Result<BlameExit> {
        let status = self.child.wait().await?;
        let stderr = (&mut self.stderr).await.unwrap_or_default();
        Ok(classify_exit(status.code(), self.untracked_exit_code, stderr))
    }
}

/// Map a blame exit code onto the cache's view of it.
pub fn classify_exit(code: Option<i32>, untracked_exit_code: i32, stderr: String) -> BlameExit {
    match code {
        Some(0) => BlameExit::Success,
        Some(code) if code == untracked_exit_code => BlameExit::Untracked,
        code => BlameExit::Failed { code, stderr },
    }
}
