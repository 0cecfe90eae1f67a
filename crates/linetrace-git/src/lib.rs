//! Linetrace Git Integration
//!
//! Repository discovery and commit lookups through libgit2, and streaming
//! attribution from the `git blame --incremental` subprocess.

pub mod backend;
pub mod blame;
pub mod commit;
pub mod repository;

pub use backend::GitCliBackend;
pub use blame::GitBlameStream;
pub use repository::{GitError, GitRepository};
