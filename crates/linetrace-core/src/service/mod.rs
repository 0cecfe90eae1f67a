//! Blame service: the notification and read API consumed by editor glue.
//!
//! The service owns a [`Registry`] of repository sessions behind one mutex.
//! The mutex is never held across an await, so every invariant of the file
//! states holds at each suspension point. Attribution runs are spawned as
//! tasks and stream into the file state one line at a time.

pub mod models;
pub mod registry;

use crate::backend::{BlameExit, BlameOptions, GitBackend};
use crate::config::BlameConfig;
use crate::coordinator::{Action, Coordinator, Trigger};
use crate::error::{Error, Result};
use crate::file_state::{LineAttribution, LoadOutcome, TrackedState};
use crate::guard::RunawayGuard;
use crate::message::present_message;
use crate::parser::IncrementalParser;
use crate::patch::ContentChange;
use crate::revision::{Commit, Ref};
use crate::session::RepositorySession;
use crate::staleness::{ObserverId, UpdateTracker};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

pub use models::*;
pub use registry::Registry;

type MessageFetch = Shared<BoxFuture<'static, std::result::Result<String, String>>>;

struct ServiceState {
    registry: Registry,
    guard: RunawayGuard,
    tracker: UpdateTracker,
    /// In-flight message fetches keyed by repository root and revision.
    pending_messages: HashMap<(PathBuf, String), MessageFetch>,
}

struct Inner {
    backend: Arc<dyn GitBackend>,
    config: BlameConfig,
    coordinator: Coordinator,
    state: Mutex<ServiceState>,
    disabled: AtomicBool,
    next_generation: AtomicU64,
}

/// Incremental blame cache for a set of repositories.
#[derive(Clone)]
pub struct BlameService {
    inner: Arc<Inner>,
}

impl BlameService {
    pub fn new(backend: Arc<dyn GitBackend>, config: BlameConfig) -> Self {
        let guard = RunawayGuard::new(config.runaway_limit, config.runaway_window());
        Self {
            inner: Arc::new(Inner {
                backend,
                coordinator: Coordinator::new(config.reblame_on_save),
                config,
                state: Mutex::new(ServiceState {
                    registry: Registry::new(),
                    guard,
                    tracker: UpdateTracker::new(),
                    pending_messages: HashMap::new(),
                }),
                disabled: AtomicBool::new(false),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &BlameConfig {
        &self.inner.config
    }

    /// Whether the runaway guard shut the service down.
    pub fn is_disabled(&self) -> bool {
        self.inner.disabled.load(Ordering::SeqCst)
    }

    /// A document was opened or focused.
    pub async fn notify_document_opened(&self, doc: &DocumentInfo) -> Result<()> {
        self.handle(doc, Trigger::Opened { dirty: doc.dirty }, "open")
            .await
    }

    /// A document was written to disk.
    pub async fn notify_document_saved(&self, doc: &DocumentInfo) -> Result<()> {
        self.handle(doc, Trigger::Saved, "save").await
    }

    /// The user asked to reload a document's attribution.
    pub async fn notify_reload_requested(
        &self,
        doc: &DocumentInfo,
        options: ReloadOptions,
    ) -> Result<()> {
        self.handle(doc, Trigger::Reload { force: options.force }, "reload")
            .await
    }

    /// A live edit; patched in place or queued behind a running load.
    pub fn notify_content_change(&self, path: &Path, change: ContentChange) -> Result<()> {
        self.inner.ensure_enabled()?;
        let mut state = self.inner.lock();
        if let Some(file) = state
            .registry
            .session_for_mut(path)
            .and_then(|session| session.file_mut(path))
        {
            file.apply_change(change);
            file.mark_dirty();
        }
        Ok(())
    }

    /// The document was closed; its state is dropped.
    pub fn notify_document_closed(&self, path: &Path) {
        let mut state = self.inner.lock();
        if let Some(session) = state.registry.session_for_mut(path) {
            session.remove_file(path);
        }
    }

    /// The repository left the workspace.
    pub fn notify_repository_closed(&self, root: &Path) {
        let mut state = self.inner.lock();
        if state.registry.remove(root).is_some() {
            state.pending_messages.retain(|(r, _), _| r != root);
            tracing::info!(root = %root.display(), "Repository session closed");
        }
    }

    /// Drop every cached file state and commit record.
    pub fn notify_cache_clear(&self) {
        let mut state = self.inner.lock();
        state.registry.clear();
        state.pending_messages.clear();
        tracing::info!("Blame cache cleared");
    }

    /// Current attribution of a line.
    pub fn line_attribution(&self, path: &Path, line: usize) -> Result<LineAttribution> {
        self.inner.ensure_enabled()?;
        let state = self.inner.lock();
        Ok(match state.registry.session_for(path) {
            Some(session) => session.attribution(path, line),
            None => LineAttribution::Untracked,
        })
    }

    /// Lifecycle summary of a file, if it has state.
    pub fn file_status(&self, path: &Path) -> Option<FileStatus> {
        let state = self.inner.lock();
        let file = state.registry.session_for(path)?.file(path)?;
        Some(FileStatus {
            state: file.state(),
            tracked: file.tracked(),
            line_count: file.lines().len(),
            pending_edits: file.pending_edits(),
        })
    }

    /// Snapshot of a file's line map.
    pub fn line_refs(&self, path: &Path) -> Option<Vec<Option<Ref>>> {
        let state = self.inner.lock();
        let file = state.registry.session_for(path)?.file(path)?;
        Some(file.lines().to_vec())
    }

    /// Commit metadata known to the repository containing `path`.
    pub fn commit(&self, path: &Path, revision: &str) -> Option<Commit> {
        let state = self.inner.lock();
        state
            .registry
            .session_for(path)?
            .commits()
            .get(revision)
            .cloned()
    }

    /// Number of commit records cached for the repository containing `path`.
    pub fn commit_count(&self, path: &Path) -> usize {
        let state = self.inner.lock();
        state
            .registry
            .session_for(path)
            .map_or(0, |session| session.commits().len())
    }

    /// Wait until the load in flight for `path` (if any) has finished.
    pub async fn wait_until_loaded(&self, path: &Path) -> Result<()> {
        let receiver = {
            let mut state = self.inner.lock();
            let file = state
                .registry
                .session_for_mut(path)
                .and_then(|session| session.file_mut(path));
            match file {
                Some(file) => {
                    let (tx, rx) = oneshot::channel();
                    file.add_observer(tx).ok().map(|()| rx)
                }
                None => None,
            }
        };
        if let Some(receiver) = receiver {
            // A dropped sender means the state was invalidated; either way
            // nothing is loading for this observer anymore.
            let _ = receiver.await;
        }
        self.inner.ensure_enabled()
    }

    /// Full message of `revision` in presentation form.
    ///
    /// Loaded once per repository; concurrent requests share one fetch.
    pub async fn request_commit_message(&self, path: &Path, revision: &str) -> Result<String> {
        self.inner.ensure_enabled()?;
        let (root, fetch) = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            let root = state
                .registry
                .root_for(path)
                .ok_or_else(|| Error::NotFound(format!("repository for {}", path.display())))?;
            let cached = state
                .registry
                .session(&root)
                .and_then(|session| session.commits().get(revision))
                .and_then(|commit| commit.message.clone());
            if let Some(message) = cached {
                return Ok(message);
            }

            let fetch = state
                .pending_messages
                .entry((root.clone(), revision.to_string()))
                .or_insert_with(|| {
                    tracing::debug!(revision, "Fetching commit message");
                    let backend = Arc::clone(&self.inner.backend);
                    let root = root.clone();
                    let revision = revision.to_string();
                    async move {
                        backend
                            .commit_message(&root, &revision)
                            .await
                            .map_err(|e| e.to_string())
                    }
                    .boxed()
                    .shared()
                })
                .clone();
            (root, fetch)
        };

        let raw = fetch.await;

        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state
            .pending_messages
            .remove(&(root.clone(), revision.to_string()));
        let raw = raw.map_err(Error::Git)?;

        let session = match state.registry.session_mut(&root) {
            Some(session) => session,
            None => return Ok(present_message(&raw, None)),
        };
        let presented = present_message(&raw, session.host());
        session
            .commits_mut()
            .fill_message(revision, presented.clone());
        Ok(session
            .commits()
            .get(revision)
            .and_then(|commit| commit.message.clone())
            .unwrap_or(presented))
    }

    /// Resolve everything needed to render `line` for `observer`.
    ///
    /// Returns `None` if the observer started a newer update while this one
    /// was waiting for a commit message.
    pub async fn annotate(
        &self,
        observer: ObserverId,
        path: &Path,
        line: usize,
    ) -> Result<Option<LineAnnotation>> {
        self.inner.ensure_enabled()?;
        let ticket = self.inner.lock().tracker.begin(observer);
        let attribution = self.line_attribution(path, line)?;

        let message = match attribution.revision_id() {
            Some(revision) => Some(self.request_commit_message(path, revision).await),
            None => None,
        };

        if !self.inner.lock().tracker.is_current(&ticket) {
            tracing::debug!(?observer, line, "Dropping superseded annotation");
            return Ok(None);
        }
        Ok(Some(LineAnnotation {
            line,
            attribution,
            message: message.transpose()?,
        }))
    }

    /// Invalidate every pending annotation of `observer`.
    pub fn forget_observer(&self, observer: ObserverId) {
        self.inner.lock().tracker.forget(observer);
    }

    async fn handle(&self, doc: &DocumentInfo, trigger: Trigger, operation: &'static str) -> Result<()> {
        self.inner.check(operation)?;
        let root = match self.resolve_root(&doc.path).await? {
            Some(root) => root,
            None => {
                tracing::debug!(path = %doc.path.display(), "Not inside a repository");
                return Ok(());
            }
        };
        self.refresh_head(&root).await;

        let action = {
            let state = self.inner.lock();
            let session = match state.registry.session(&root) {
                Some(session) => session,
                None => return Ok(()),
            };
            self.inner.coordinator.decide(session.file(&doc.path), trigger)
        };
        tracing::debug!(path = %doc.path.display(), ?trigger, ?action, "Reload decision");

        match action {
            Action::Reuse | Action::Join => Ok(()),
            Action::Load => self.start_load(&root, doc),
            Action::MarkDirty { probe_tracked } => {
                {
                    let mut state = self.inner.lock();
                    if let Some(session) = state.registry.session_mut(&root) {
                        session.file_entry(&doc.path).mark_dirty();
                    }
                }
                if probe_tracked {
                    self.probe_tracked(&root, &doc.path).await;
                }
                Ok(())
            }
        }
    }

    async fn resolve_root(&self, path: &Path) -> Result<Option<PathBuf>> {
        let known = self.inner.lock().registry.root_for(path);
        if let Some(root) = known {
            return Ok(Some(root));
        }
        let info = match self.inner.backend.discover(path).await? {
            Some(info) => info,
            None => return Ok(None),
        };
        tracing::info!(root = %info.root.display(), "Opened repository session");
        let mut state = self.inner.lock();
        let session = state.registry.insert(RepositorySession::new(info));
        Ok(Some(session.root().to_path_buf()))
    }

    async fn refresh_head(&self, root: &Path) {
        match self.inner.backend.head(root).await {
            Ok(head) => {
                let mut state = self.inner.lock();
                if let Some(session) = state.registry.session_mut(root) {
                    session.observe_head(head);
                }
            }
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Failed to read head");
            }
        }
    }

    async fn probe_tracked(&self, root: &Path, path: &Path) {
        match self.inner.backend.is_tracked(root, path).await {
            Ok(tracked) => {
                let mut state = self.inner.lock();
                if let Some(file) = state
                    .registry
                    .session_mut(root)
                    .and_then(|session| session.file_mut(path))
                {
                    if file.tracked() == TrackedState::Unknown {
                        file.set_tracked(if tracked { TrackedState::Yes } else { TrackedState::No });
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Tracked-file probe failed");
            }
        }
    }

    fn start_load(&self, root: &Path, doc: &DocumentInfo) -> Result<()> {
        self.inner.check("load")?;
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.inner.lock();
            let session = match state.registry.session_mut(root) {
                Some(session) => session,
                None => return Ok(()),
            };
            if !session.file_entry(&doc.path).begin_load(generation, doc.line_count) {
                return Ok(());
            }
        }

        tracing::info!(path = %doc.path.display(), generation, "Loading attribution");
        let inner = Arc::clone(&self.inner);
        let root = root.to_path_buf();
        let path = doc.path.clone();
        tokio::spawn(async move {
            inner.run_load(root, path, generation).await;
        });
        Ok(())
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.disabled.load(Ordering::SeqCst) {
            Err(Error::Disabled)
        } else {
            Ok(())
        }
    }

    /// Count an invocation against the runaway guard.
    fn check(&self, operation: &'static str) -> Result<()> {
        self.ensure_enabled()?;
        let result = self.lock().guard.record(operation);
        if let Err(e) = &result {
            self.shut_down(e);
        }
        result
    }

    fn shut_down(&self, reason: &Error) {
        if self.disabled.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.lock();
        let repositories = state.registry.len();
        state.registry.clear();
        state.pending_messages.clear();
        state.tracker.clear();
        tracing::error!(error = %reason, repositories, "Disabling blame cache");
    }

    async fn run_load(self: Arc<Self>, root: PathBuf, path: PathBuf, generation: u64) {
        let streamed = AssertUnwindSafe(self.stream_attribution(&root, &path, generation))
            .catch_unwind()
            .await;
        let outcome = match streamed {
            Err(_) => {
                tracing::error!(path = %path.display(), generation, "Attribution load panicked");
                LoadOutcome::Failed
            }
            Ok(Ok(BlameExit::Success)) => LoadOutcome::Complete,
            Ok(Ok(BlameExit::Untracked)) => {
                tracing::debug!(path = %path.display(), "File is not tracked");
                LoadOutcome::Untracked
            }
            Ok(Ok(BlameExit::Failed { code, stderr })) => {
                tracing::warn!(
                    path = %path.display(),
                    code = ?code,
                    stderr = %stderr.trim(),
                    "git blame failed"
                );
                LoadOutcome::Failed
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "Attribution load failed");
                LoadOutcome::Failed
            }
        };

        let observers = {
            let mut state = self.lock();
            state
                .registry
                .session_mut(&root)
                .and_then(|session| session.file_mut(&path))
                .map(|file| file.finish_load(generation, outcome))
                .unwrap_or_default()
        };
        tracing::debug!(
            path = %path.display(),
            generation,
            ?outcome,
            observers = observers.len(),
            "Attribution load finished"
        );
        for observer in observers {
            let _ = observer.send(());
        }
    }

    async fn stream_attribution(
        &self,
        root: &Path,
        path: &Path,
        generation: u64,
    ) -> Result<BlameExit> {
        let options = BlameOptions {
            ignore_whitespace: self.config.ignore_whitespace,
        };
        let mut stream = self.backend.blame(root, path, options).await?;
        let mut parser = IncrementalParser::new();
        let mut superseded = false;

        while let Some(line) = stream.next_line().await? {
            if superseded {
                continue;
            }
            let accepted = {
                let mut state = self.lock();
                state
                    .registry
                    .session_mut(root)
                    .is_some_and(|session| session.ingest(path, generation, &mut parser, &line))
            };
            if !accepted {
                tracing::debug!(path = %path.display(), generation, "Load superseded, draining output");
                superseded = true;
            }
        }

        let summary = parser.finish();
        tracing::debug!(
            path = %path.display(),
            entries = summary.entries,
            commits = summary.commits_created,
            abandoned = summary.abandoned,
            "Attribution stream ended"
        );
        stream.finish().await
    }
}
