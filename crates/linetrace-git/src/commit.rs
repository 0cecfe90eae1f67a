//! Single-shot git invocations: commit messages and the tracked-file probe.

use crate::repository::{GitError, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;

async fn run_git(git_binary: &str, root: &Path, args: &[&OsStr]) -> Result<Output> {
    let output = Command::new(git_binary)
        .current_dir(root)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;
    Ok(output)
}

fn command_error(command: &str, output: &Output) -> GitError {
    GitError::Command {
        command: command.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

/// Full raw message of `revision` (`git show -s --format=%B`).
pub async fn show_message(git_binary: &str, root: &Path, revision: &str) -> Result<String> {
    if revision.is_empty() || !revision.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(GitError::InvalidRevision(revision.to_string()));
    }
    let output = run_git(
        git_binary,
        root,
        &[
            OsStr::new("show"),
            OsStr::new("-s"),
            OsStr::new("--format=%B"),
            OsStr::new(revision),
        ],
    )
    .await?;
    if !output.status.success() {
        return Err(command_error("show", &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether git tracks `relative_path` (`git ls-files --error-unmatch`).
pub async fn is_tracked(git_binary: &str, root: &Path, relative_path: &Path) -> Result<bool> {
    let output = run_git(
        git_binary,
        root,
        &[
            OsStr::new("ls-files"),
            OsStr::new("--error-unmatch"),
            OsStr::new("--"),
            relative_path.as_os_str(),
        ],
    )
    .await?;
    tracked_from_exit(output.status.code()).ok_or_else(|| command_error("ls-files", &output))
}

/// Exit 0 means tracked, exit 1 means untracked; anything else is an error.
fn tracked_from_exit(code: Option<i32>) -> Option<bool> {
    match code {
        Some(0) => Some(true),
        Some(1) => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_from_exit() {
        assert_eq!(tracked_from_exit(Some(0)), Some(true));
        assert_eq!(tracked_from_exit(Some(1)), Some(false));
        assert_eq!(tracked_from_exit(Some(128)), None);
        assert_eq!(tracked_from_exit(None), None);
    }

    #[tokio::test]
    async fn test_rejects_non_hex_revision() {
        let result = show_message("git", Path::new("."), "--output=/tmp/x").await;
        assert!(matches!(result, Err(GitError::InvalidRevision(_))));
        let result = show_message("git", Path::new("."), "").await;
        assert!(matches!(result, Err(GitError::InvalidRevision(_))));
    }
}
