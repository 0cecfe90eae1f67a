//! Line command implementation.

use super::{describe, load_document, GlobalOptions};
use anyhow::{bail, Result};
use chrono::Utc;
use colored::Colorize;
use linetrace_core::LineAttribution;
use std::path::PathBuf;

/// Run the line command.
pub async fn run(file: PathBuf, line: usize, options: &GlobalOptions) -> Result<()> {
    let (service, path, lines) = load_document(&file, options).await?;
    if line == 0 || line > lines.len() {
        bail!("{} has {} lines, got line {}", path.display(), lines.len(), line);
    }
    let index = line - 1;

    let attribution = service.line_attribution(&path, index)?;
    println!("{} {}", "→".blue(), describe(&attribution, Utc::now()));
    println!("   {}", lines[index].dimmed());

    if let LineAttribution::Commit { revision, commit, .. } = &attribution {
        println!();
        println!("   Commit: {}", revision.magenta());
        println!("   Author: {}", commit.author_line());
        println!("   Date: {}", commit.authored_at().format("%Y-%m-%d %H:%M"));
        if let Some(previous) = &commit.previous_path {
            println!("   Renamed from: {}", previous);
        }
        println!();

        match service.request_commit_message(&path, revision).await {
            Ok(message) => {
                for text in message.lines() {
                    println!("   {}", text);
                }
            }
            Err(e) => eprintln!("{} Could not load message: {}", "⚠".yellow(), e),
        }
    }
    Ok(())
}
