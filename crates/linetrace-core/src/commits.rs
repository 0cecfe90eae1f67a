//! Deduplicated commit metadata store.

use crate::revision::Commit;
use std::collections::HashMap;

/// Revision id to commit metadata, shared by all files of one repository.
///
/// The first record inserted for a revision id wins; later inserts for the same
/// id are ignored. Lazily loaded fields can be filled once and never change.
#[derive(Debug, Default)]
pub struct CommitStore {
    commits: HashMap<String, Commit>,
}

impl CommitStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.commits.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Commit> {
        self.commits.get(id)
    }

    /// Insert a commit unless one with the same id exists.
    ///
    /// Returns `true` if the record was inserted.
    pub fn insert_if_absent(&mut self, commit: Commit) -> bool {
        if self.commits.contains_key(&commit.id) {
            return false;
        }
        self.commits.insert(commit.id.clone(), commit);
        true
    }

    /// Record the pre-rename path of a revision if none is known yet.
    pub fn fill_previous_path(&mut self, id: &str, path: &str) -> bool {
        match self.commits.get_mut(id) {
            Some(commit) if commit.previous_path.is_none() => {
                commit.previous_path = Some(path.to_string());
                true
            }
            _ => false,
        }
    }

    /// Record the presentation form of a commit message if none is known yet.
    pub fn fill_message(&mut self, id: &str, message: String) -> bool {
        match self.commits.get_mut(id) {
            Some(commit) if commit.message.is_none() => {
                commit.message = Some(message);
                true
            }
            _ => false,
        }
    }

    /// Number of known commits.
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.commits.clear();
    }
}
