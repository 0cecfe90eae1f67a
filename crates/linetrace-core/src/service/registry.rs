//! Explicit registry of repository sessions.

use crate::session::RepositorySession;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// All repository sessions of one workspace, keyed by working tree root.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<PathBuf, RepositorySession>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root of the innermost known repository containing `path`.
    pub fn root_for(&self, path: &Path) -> Option<PathBuf> {
        self.sessions
            .keys()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .cloned()
    }

    pub fn session(&self, root: &Path) -> Option<&RepositorySession> {
        self.sessions.get(root)
    }

    pub fn session_mut(&mut self, root: &Path) -> Option<&mut RepositorySession> {
        self.sessions.get_mut(root)
    }

    /// Session of the repository containing `path`.
    pub fn session_for(&self, path: &Path) -> Option<&RepositorySession> {
        let root = self.root_for(path)?;
        self.sessions.get(&root)
    }

    pub fn session_for_mut(&mut self, path: &Path) -> Option<&mut RepositorySession> {
        let root = self.root_for(path)?;
        self.sessions.get_mut(&root)
    }

    /// Add a session unless one exists for the same root.
    pub fn insert(&mut self, session: RepositorySession) -> &mut RepositorySession {
        self.sessions
            .entry(session.root().to_path_buf())
            .or_insert(session)
    }

    pub fn remove(&mut self, root: &Path) -> Option<RepositorySession> {
        self.sessions.remove(root)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}
