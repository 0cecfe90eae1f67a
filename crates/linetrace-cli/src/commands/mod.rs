//! Command implementations and the plumbing they share.

pub mod blame;
pub mod line;
pub mod session;
pub mod show;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use linetrace_core::{
    format_relative, BlameConfig, BlameService, DocumentInfo, LineAttribution,
};
use linetrace_git::{GitCliBackend, GitRepository};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Flags that apply to every command.
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub ignore_whitespace: bool,
}

impl GlobalOptions {
    /// Resolve configuration: an explicit file, else the repository's
    /// `.linetrace/config.json`, else defaults. Flags override file values.
    pub fn load_config(&self, near: &Path) -> Result<BlameConfig> {
        let mut config = match &self.config {
            Some(path) => BlameConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => match GitRepository::discover(near)? {
                Some(repo) => BlameConfig::load_for_repo(repo.root())?,
                None => BlameConfig::default(),
            },
        };
        if self.ignore_whitespace {
            config.ignore_whitespace = true;
        }
        tracing::debug!(?config, "Configuration resolved");
        Ok(config)
    }
}

pub fn build_service(config: BlameConfig) -> BlameService {
    let backend = Arc::new(GitCliBackend::new(&config));
    BlameService::new(backend, config)
}

/// Canonical path and contents of a file on disk.
pub fn read_document(file: &Path) -> Result<(PathBuf, Vec<String>)> {
    let path = file
        .canonicalize()
        .with_context(|| format!("cannot open {}", file.display()))?;
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let lines = content.lines().map(str::to_string).collect();
    Ok((path, lines))
}

/// Open `file` in a fresh service and wait for its attribution.
pub async fn load_document(
    file: &Path,
    options: &GlobalOptions,
) -> Result<(BlameService, PathBuf, Vec<String>)> {
    let (path, lines) = read_document(file)?;
    let service = build_service(options.load_config(&path)?);
    service
        .notify_document_opened(&DocumentInfo::new(path.clone(), lines.len()))
        .await?;
    service.wait_until_loaded(&path).await?;
    Ok((service, path, lines))
}

/// One-line summary of an attribution, e.g. `a1b2c3d You, 3 days ago`.
pub fn describe(attribution: &LineAttribution, now: DateTime<Utc>) -> String {
    match attribution {
        LineAttribution::Commit { commit, is_self, .. } => {
            let author = if *is_self { "You" } else { commit.author.as_str() };
            format!(
                "{} {}, {}",
                commit.short_id(),
                author,
                format_relative(commit.timestamp_seconds, now)
            )
        }
        LineAttribution::Uncommitted => "Uncommitted changes".to_string(),
        LineAttribution::Untracked => "Not tracked by git".to_string(),
        LineAttribution::Dirty => "Save to see attribution".to_string(),
        LineAttribution::Loading => "Loading".to_string(),
        LineAttribution::Failed => "Attribution failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linetrace_core::Commit;

    #[test]
    fn test_describe() {
        let now = DateTime::<Utc>::from_timestamp(1_000_000_000 + 3 * 86_400, 0).unwrap();
        let commit = Commit {
            id: "a1b2c3d4e5f60718293a4b5c6d7e8f9012345678".to_string(),
            author: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            timestamp_seconds: 1_000_000_000,
            summary: "Tidy".to_string(),
            path: "src/lib.rs".to_string(),
            previous_path: None,
            message: None,
        };
        let attribution = LineAttribution::Commit {
            revision: commit.id.clone(),
            commit,
            is_self: false,
        };
        assert_eq!(describe(&attribution, now), "a1b2c3d Grace, 3 days ago");
        assert_eq!(
            describe(&LineAttribution::Uncommitted, now),
            "Uncommitted changes"
        );
    }
}
