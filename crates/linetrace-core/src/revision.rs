//! Revision references and commit metadata records.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Revision id git reports for lines that are not committed yet.
pub const UNCOMMITTED_ID: &str = "0000000000000000000000000000000000000000";

/// What a line is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Ref {
    /// A concrete, immutable revision id.
    Committed(String),
    /// The user's working-tree changes.
    Uncommitted,
}

impl Ref {
    /// Interpret a revision id from the attribution stream.
    ///
    /// The all-zero id maps to [`Ref::Uncommitted`].
    pub fn parse(id: &str) -> Self {
        if is_null_id(id) {
            Ref::Uncommitted
        } else {
            Ref::Committed(id.to_string())
        }
    }

    /// The revision id, if this is a committed reference.
    pub fn revision_id(&self) -> Option<&str> {
        match self {
            Ref::Committed(id) => Some(id),
            Ref::Uncommitted => None,
        }
    }

    pub fn is_uncommitted(&self) -> bool {
        matches!(self, Ref::Uncommitted)
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Committed(id) => write!(f, "{}", id),
            Ref::Uncommitted => write!(f, "uncommitted"),
        }
    }
}

fn is_null_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b == b'0')
}

/// Metadata for one commit, shared by every file of a repository.
///
/// `author`, `email`, `timestamp_seconds` and `summary` are written once when
/// the record is created. `message` and `previous_path` start empty and may be
/// filled later through [`crate::CommitStore`], which never overwrites them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full revision id.
    pub id: String,
    /// Author name.
    pub author: String,
    /// Author email, without angle brackets.
    pub email: String,
    /// Author timestamp in seconds since the epoch.
    pub timestamp_seconds: i64,
    /// First line of the commit message.
    pub summary: String,
    /// Path of the file at this revision.
    pub path: String,
    /// Path of the file before a rename in this revision.
    pub previous_path: Option<String>,
    /// Full message in presentation form, loaded on demand.
    pub message: Option<String>,
}

impl Commit {
    /// Short revision id (7 characters).
    pub fn short_id(&self) -> &str {
        &self.id[..7.min(self.id.len())]
    }

    /// Author timestamp as a UTC date.
    pub fn authored_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.timestamp_seconds, 0)
            .single()
            .unwrap_or_default()
    }

    /// Get author in "Name <email>" format.
    pub fn author_line(&self) -> String {
        if self.email.is_empty() {
            self.author.clone()
        } else {
            format!("{} <{}>", self.author, self.email)
        }
    }

    /// Whether this commit was authored by the given email address.
    pub fn is_authored_by(&self, email: &str) -> bool {
        !email.is_empty() && self.email.eq_ignore_ascii_case(email)
    }
}
