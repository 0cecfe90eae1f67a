//! Per-repository cache session.

use crate::backend::RepoInfo;
use crate::commits::CommitStore;
use crate::file_state::{FileBlame, LineAttribution};
use crate::message::HostInfo;
use crate::parser::IncrementalParser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One repository's file states and commit store.
///
/// File states are relative to the head they were computed against and are
/// dropped when head moves. Commit metadata is immutable and survives.
#[derive(Debug)]
pub struct RepositorySession {
    info: RepoInfo,
    head: Option<String>,
    head_known: bool,
    files: HashMap<PathBuf, FileBlame>,
    commits: CommitStore,
}

impl RepositorySession {
    pub fn new(info: RepoInfo) -> Self {
        Self {
            info,
            head: None,
            head_known: false,
            files: HashMap::new(),
            commits: CommitStore::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.info.root
    }

    pub fn user_email(&self) -> Option<&str> {
        self.info.user_email.as_deref()
    }

    pub fn host(&self) -> Option<&HostInfo> {
        self.info.host.as_ref()
    }

    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    /// Compare a freshly read head with the cached one.
    ///
    /// On change every file state is dropped (waking their observers) and
    /// `true` is returned. The first observation only records the value.
    pub fn observe_head(&mut self, head: Option<String>) -> bool {
        if !self.head_known {
            self.head = head;
            self.head_known = true;
            return false;
        }
        if self.head == head {
            return false;
        }
        tracing::info!(
            root = %self.info.root.display(),
            from = self.head.as_deref().unwrap_or("<unborn>"),
            to = head.as_deref().unwrap_or("<unborn>"),
            files = self.files.len(),
            "Head changed, invalidating file attributions"
        );
        self.head = head;
        self.files.clear();
        true
    }

    pub fn file(&self, path: &Path) -> Option<&FileBlame> {
        self.files.get(path)
    }

    pub fn file_mut(&mut self, path: &Path) -> Option<&mut FileBlame> {
        self.files.get_mut(path)
    }

    /// File state for `path`, created on first observation.
    pub fn file_entry(&mut self, path: &Path) -> &mut FileBlame {
        self.files.entry(path.to_path_buf()).or_default()
    }

    pub fn remove_file(&mut self, path: &Path) -> Option<FileBlame> {
        self.files.remove(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn commits(&self) -> &CommitStore {
        &self.commits
    }

    pub fn commits_mut(&mut self) -> &mut CommitStore {
        &mut self.commits
    }

    /// Feed one line of attribution output for `path`'s load `generation`.
    ///
    /// Returns `false` if the load was superseded or the file dropped.
    pub fn ingest(
        &mut self,
        path: &Path,
        generation: u64,
        parser: &mut IncrementalParser,
        line: &str,
    ) -> bool {
        match self.files.get_mut(path) {
            Some(file) => file.ingest(generation, parser, line, &mut self.commits),
            None => false,
        }
    }

    /// Attribution of `line` in `path`.
    ///
    /// A file this session has not observed yet reads as loading.
    pub fn attribution(&self, path: &Path, line: usize) -> LineAttribution {
        match self.files.get(path) {
            Some(file) => file.attribution(line, &self.commits, self.user_email()),
            None => LineAttribution::Loading,
        }
    }

    /// Drop every file state and commit record.
    pub fn clear(&mut self) {
        self.files.clear();
        self.commits.clear();
    }
}
