//! Linetrace Core Library
//!
//! Incremental per-line blame cache: attribution stream parsing, live edit
//! patching, commit metadata and the notification-driven service.

pub mod backend;
pub mod commits;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod file_state;
pub mod guard;
pub mod message;
pub mod parser;
pub mod patch;
pub mod revision;
pub mod service;
pub mod session;
pub mod staleness;

#[cfg(test)]
pub mod testutils;

pub use backend::{AttributionStream, BlameExit, BlameOptions, GitBackend, RepoInfo};
pub use commits::CommitStore;
pub use config::BlameConfig;
pub use error::{Error, Result};
pub use file_state::{FileBlame, LineAttribution, LoadOutcome, LoadState, TrackedState};
pub use message::{format_relative, present_message, HostInfo};
pub use parser::{IncrementalParser, ParseSummary};
pub use patch::{apply_change, ContentChange};
pub use revision::{Commit, Ref, UNCOMMITTED_ID};
pub use service::{BlameService, DocumentInfo, FileStatus, LineAnnotation, ReloadOptions};
pub use staleness::ObserverId;
