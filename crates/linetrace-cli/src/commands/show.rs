//! Show command implementation.

use super::GlobalOptions;
use anyhow::{Context, Result};
use colored::Colorize;
use linetrace_core::{present_message, GitBackend};
use linetrace_git::GitCliBackend;
use std::path::PathBuf;

/// Run the show command.
pub async fn run(revision: String, repo: PathBuf, options: &GlobalOptions) -> Result<()> {
    let config = options.load_config(&repo)?;
    let backend = GitCliBackend::new(&config);
    let repo = repo.canonicalize().unwrap_or(repo);

    let info = match backend.discover(&repo).await? {
        Some(info) => info,
        None => {
            eprintln!("{} Not a git repository: {}", "✗".red(), repo.display());
            return Ok(());
        }
    };

    let raw = backend
        .commit_message(&info.root, &revision)
        .await
        .with_context(|| format!("loading message of {}", revision))?;

    println!("{} {}", "→".blue(), revision.magenta());
    if let Some(host) = &info.host {
        println!("   {}", host.commit_url(&revision).dimmed());
    }
    println!();
    println!("{}", present_message(&raw, info.host.as_ref()));
    Ok(())
}
