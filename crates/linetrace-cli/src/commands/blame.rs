//! Blame command implementation.

use super::{describe, load_document, GlobalOptions};
use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use linetrace_core::LineAttribution;
use std::path::PathBuf;

/// Run the blame command.
pub async fn run(file: PathBuf, options: &GlobalOptions) -> Result<()> {
    let (service, path, lines) = load_document(&file, options).await?;
    let now = Utc::now();

    if let Some(status) = service.file_status(&path) {
        tracing::debug!(?status, "Loaded");
    }

    let labels: Vec<(String, LineAttribution)> = (0..lines.len())
        .map(|i| {
            let attribution = service.line_attribution(&path, i)?;
            Ok((describe(&attribution, now), attribution))
        })
        .collect::<Result<_>>()?;
    let width = labels.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let number_width = lines.len().to_string().len();

    for (i, (content, (label, attribution))) in lines.iter().zip(&labels).enumerate() {
        let padded = format!("{:<width$}", label, width = width);
        let label = match attribution {
            LineAttribution::Commit { is_self: true, .. } => padded.green(),
            LineAttribution::Commit { .. } => padded.cyan(),
            LineAttribution::Uncommitted => padded.yellow(),
            LineAttribution::Failed => padded.red(),
            _ => padded.dimmed(),
        };
        let number = format!("{:>nw$}", i + 1, nw = number_width);
        println!("{} {} │ {}", label, number.dimmed(), content);
    }

    let commits = service.commit_count(&path);
    eprintln!(
        "{} {} lines, {} commits",
        "✓".green(),
        lines.len(),
        commits
    );
    Ok(())
}
