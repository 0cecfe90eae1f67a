//! Linetrace CLI
//!
//! Command-line front end for the incremental blame cache.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "linetrace")]
#[command(author, version, about = "Line-by-line git attribution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to .linetrace/config.json in the repository)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Ignore whitespace-only changes when attributing lines
    #[arg(short = 'w', long, global = true)]
    ignore_whitespace: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate every line of a file
    Blame {
        /// File to annotate
        file: PathBuf,
    },

    /// Show the attribution and commit message of one line
    Line {
        /// File containing the line
        file: PathBuf,

        /// Line number (1-based)
        line: usize,
    },

    /// Show a commit message in presentation form
    Show {
        /// Revision id
        revision: String,

        /// Any path inside the repository
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,
    },

    /// Serve JSON-lines notifications and queries on stdin/stdout
    Session,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for the session protocol.
    let filter = if cli.verbose {
        "linetrace=debug"
    } else {
        "linetrace=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = commands::GlobalOptions {
        config: cli.config,
        ignore_whitespace: cli.ignore_whitespace,
    };

    match cli.command {
        Commands::Blame { file } => {
            commands::blame::run(file, &options).await?;
        }
        Commands::Line { file, line } => {
            commands::line::run(file, line, &options).await?;
        }
        Commands::Show { revision, repo } => {
            commands::show::run(revision, repo, &options).await?;
        }
        Commands::Session => {
            commands::session::run(&options).await?;
        }
    }

    Ok(())
}
