//! Test utilities for Linetrace.
//!
//! Provides a scripted in-memory [`GitBackend`] and stream fixtures.

use crate::backend::{AttributionStream, BlameExit, BlameOptions, GitBackend, RepoInfo};
use crate::error::{Error, Result};
use crate::message::HostInfo;
use crate::revision::UNCOMMITTED_ID;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Root every scripted repository lives under.
pub const ROOT: &str = "/repo";

/// Absolute path of a file in the scripted repository.
pub fn repo_path(name: &str) -> PathBuf {
    Path::new(ROOT).join(name)
}

/// Builder for incremental blame output.
#[derive(Debug, Default, Clone)]
pub struct StreamBuilder {
    lines: Vec<String>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An entry with full metadata tags.
    pub fn commit(mut self, id: &str, author: &str, start: usize, count: usize) -> Self {
        self.lines.push(format!("{} {} {} {}", id, start, start, count));
        self.lines.push(format!("author {}", author));
        self.lines.push(format!("author-mail <{}@example.com>", author.to_lowercase()));
        self.lines.push("author-time 1000000000".to_string());
        self.lines.push("author-tz +0000".to_string());
        self.lines.push(format!("summary Commit by {}", author));
        self.lines.push("filename file.rs".to_string());
        self
    }

    /// An entry for a revision already described earlier in the stream.
    pub fn repeat(mut self, id: &str, start: usize, count: usize) -> Self {
        self.lines.push(format!("{} {} {} {}", id, start, start, count));
        self.lines.push("filename file.rs".to_string());
        self
    }

    pub fn uncommitted(self, start: usize, count: usize) -> Self {
        self.repeat(UNCOMMITTED_ID, start, count)
    }

    pub fn build(self) -> Vec<String> {
        self.lines
    }
}

#[derive(Debug, Clone)]
struct ScriptedBlame {
    lines: Vec<String>,
    exit: BlameExit,
    gate: Option<Arc<Notify>>,
    panics: bool,
}

#[derive(Debug, Default)]
struct Script {
    head: Option<String>,
    user_email: Option<String>,
    blames: HashMap<PathBuf, ScriptedBlame>,
    messages: HashMap<String, String>,
    message_gates: HashMap<String, Arc<Notify>>,
    tracked: HashSet<PathBuf>,
    blame_calls: HashMap<PathBuf, usize>,
    message_calls: HashMap<String, usize>,
    probe_calls: usize,
}

/// In-memory backend with a single repository at [`ROOT`].
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        let backend = Self::default();
        backend.set_head(Some("head-1"));
        backend.script().user_email = Some("alice@example.com".to_string());
        Arc::new(backend)
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn set_head(&self, head: Option<&str>) {
        self.script().head = head.map(str::to_string);
    }

    /// Script a successful blame run.
    pub fn set_blame(&self, name: &str, lines: Vec<String>) {
        self.set_blame_exit(name, lines, BlameExit::Success);
    }

    pub fn set_blame_exit(&self, name: &str, lines: Vec<String>, exit: BlameExit) {
        let mut script = self.script();
        let gate = script.blames.get(&repo_path(name)).and_then(|b| b.gate.clone());
        script.blames.insert(
            repo_path(name),
            ScriptedBlame {
                lines,
                exit,
                gate,
                panics: false,
            },
        );
    }

    /// Make the blame stream for `name` panic once its scripted lines run out.
    pub fn set_blame_panic(&self, name: &str, lines: Vec<String>) {
        self.set_blame(name, lines);
        if let Some(blame) = self.script().blames.get_mut(&repo_path(name)) {
            blame.panics = true;
        }
    }

    /// Hold blame output for `name` until the returned gate is notified.
    pub fn gate_blame(&self, name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        let mut script = self.script();
        if let Some(blame) = script.blames.get_mut(&repo_path(name)) {
            blame.gate = Some(gate.clone());
        }
        gate
    }

    pub fn set_message(&self, revision: &str, message: &str) {
        self.script()
            .messages
            .insert(revision.to_string(), message.to_string());
    }

    /// Hold message fetches for `revision` until the returned gate is notified.
    pub fn gate_message(&self, revision: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script()
            .message_gates
            .insert(revision.to_string(), gate.clone());
        gate
    }

    pub fn set_tracked(&self, name: &str) {
        self.script().tracked.insert(repo_path(name));
    }

    pub fn blame_calls(&self, name: &str) -> usize {
        self.script()
            .blame_calls
            .get(&repo_path(name))
            .copied()
            .unwrap_or(0)
    }

    pub fn message_calls(&self, revision: &str) -> usize {
        self.script()
            .message_calls
            .get(revision)
            .copied()
            .unwrap_or(0)
    }

    pub fn probe_calls(&self) -> usize {
        self.script().probe_calls
    }
}

/// Scripted attribution output.
pub struct ScriptedStream {
    lines: VecDeque<String>,
    exit: BlameExit,
    gate: Option<Arc<Notify>>,
    panics: bool,
}

#[async_trait]
impl AttributionStream for ScriptedStream {
    async fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(gate) = self.gate.take() {
            gate.notified().await;
        }
        let line = self.lines.pop_front();
        if line.is_none() && self.panics {
            panic!("scripted blame stream panicked");
        }
        Ok(line)
    }

    async fn finish(self: Box<Self>) -> Result<BlameExit> {
        Ok(self.exit)
    }
}

#[async_trait]
impl GitBackend for ScriptedBackend {
    async fn discover(&self, path: &Path) -> Result<Option<RepoInfo>> {
        if !path.starts_with(ROOT) {
            return Ok(None);
        }
        Ok(Some(RepoInfo {
            root: PathBuf::from(ROOT),
            user_email: self.script().user_email.clone(),
            host: HostInfo::from_remote_url("git@github.com:owner/repo.git"),
        }))
    }

    async fn head(&self, _root: &Path) -> Result<Option<String>> {
        Ok(self.script().head.clone())
    }

    async fn blame(
        &self,
        _root: &Path,
        path: &Path,
        _options: BlameOptions,
    ) -> Result<Box<dyn AttributionStream>> {
        let mut script = self.script();
        *script.blame_calls.entry(path.to_path_buf()).or_default() += 1;
        let blame = script
            .blames
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Git(format!("no blame scripted for {}", path.display())))?;
        Ok(Box::new(ScriptedStream {
            lines: blame.lines.into(),
            exit: blame.exit,
            gate: blame.gate,
            panics: blame.panics,
        }))
    }

    async fn commit_message(&self, _root: &Path, revision: &str) -> Result<String> {
        let gate = {
            let mut script = self.script();
            *script.message_calls.entry(revision.to_string()).or_default() += 1;
            script.message_gates.get(revision).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.script()
            .messages
            .get(revision)
            .cloned()
            .ok_or_else(|| Error::Git(format!("unknown revision {}", revision)))
    }

    async fn is_tracked(&self, _root: &Path, path: &Path) -> Result<bool> {
        let mut script = self.script();
        script.probe_calls += 1;
        Ok(script.tracked.contains(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_builder() {
        let lines = StreamBuilder::new()
            .commit("aaa1111", "Alice", 1, 2)
            .uncommitted(3, 1)
            .build();
        assert_eq!(lines[0], "aaa1111 1 1 2");
        assert_eq!(lines[2], "author-mail <alice@example.com>");
        assert_eq!(lines.last().unwrap(), "filename file.rs");
        assert_eq!(lines.len(), 9);
    }

    #[tokio::test]
    async fn test_scripted_backend_counts_calls() {
        let backend = ScriptedBackend::new();
        backend.set_message("aaa1111", "Initial commit");
        let root = Path::new(ROOT);

        assert_eq!(backend.commit_message(root, "aaa1111").await.unwrap(), "Initial commit");
        assert!(backend.commit_message(root, "missing").await.is_err());
        assert_eq!(backend.message_calls("aaa1111"), 1);
        assert!(backend.discover(Path::new("/elsewhere/a.rs")).await.unwrap().is_none());
    }
}
