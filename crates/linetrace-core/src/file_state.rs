//! Per-file blame state.

use crate::commits::CommitStore;
use crate::parser::IncrementalParser;
use crate::patch::{apply_change, ContentChange};
use crate::revision::{Commit, Ref};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// Lifecycle of a file's attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// Observed but nothing decided yet.
    Unknown,
    /// An attribution subprocess is streaming into the line map.
    Loading,
    /// Attribution finished (successfully or not).
    Done,
    /// The document has unsaved modifications.
    Dirty,
}

/// Whether version control knows the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedState {
    Yes,
    No,
    Unknown,
}

/// How an attribution run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The tool exited successfully.
    Complete,
    /// The file is not under version control.
    Untracked,
    /// The tool failed; lines without a header stay unattributed.
    Failed,
}

/// What a collaborator sees for one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LineAttribution {
    Loading,
    Uncommitted,
    Untracked,
    Dirty,
    Failed,
    Commit {
        revision: String,
        commit: Commit,
        /// The commit's author is the repository's configured user.
        is_self: bool,
    },
}

impl LineAttribution {
    /// Revision id for committed lines.
    pub fn revision_id(&self) -> Option<&str> {
        match self {
            LineAttribution::Commit { revision, .. } => Some(revision),
            _ => None,
        }
    }
}

/// Mutable attribution state of one file.
#[derive(Debug)]
pub struct FileBlame {
    state: LoadState,
    tracked: TrackedState,
    lines: Vec<Option<Ref>>,
    pending_edits: VecDeque<ContentChange>,
    observers: Vec<oneshot::Sender<()>>,
    /// Identifies the load currently writing into `lines`.
    generation: Option<u64>,
    edited_since_load: bool,
    last_outcome: Option<LoadOutcome>,
}

impl Default for FileBlame {
    fn default() -> Self {
        Self::new()
    }
}

impl FileBlame {
    pub fn new() -> Self {
        Self {
            state: LoadState::Unknown,
            tracked: TrackedState::Unknown,
            lines: Vec::new(),
            pending_edits: VecDeque::new(),
            observers: Vec::new(),
            generation: None,
            edited_since_load: false,
            last_outcome: None,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn tracked(&self) -> TrackedState {
        self.tracked
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    /// Current line map; `None` slots are not attributed yet.
    pub fn lines(&self) -> &[Option<Ref>] {
        &self.lines
    }

    pub fn ref_at(&self, line: usize) -> Option<&Ref> {
        self.lines.get(line).and_then(Option::as_ref)
    }

    /// Number of edits waiting for the current load to finish.
    pub fn pending_edits(&self) -> usize {
        self.pending_edits.len()
    }

    /// Whether the document changed after the last load began.
    pub fn edited_since_load(&self) -> bool {
        self.edited_since_load
    }

    pub fn last_outcome(&self) -> Option<LoadOutcome> {
        self.last_outcome
    }

    /// Start a load sized for a document of `line_count` lines.
    ///
    /// Returns `false` without touching anything if a load is already in
    /// flight, so at most one attribution run writes into this file.
    pub fn begin_load(&mut self, generation: u64, line_count: usize) -> bool {
        if self.is_loading() {
            return false;
        }
        self.state = LoadState::Loading;
        self.generation = Some(generation);
        self.lines = vec![None; line_count];
        self.pending_edits.clear();
        self.edited_since_load = false;
        true
    }

    /// Whether `generation` is the load currently in flight.
    pub fn is_current_load(&self, generation: u64) -> bool {
        self.is_loading() && self.generation == Some(generation)
    }

    /// Feed one line of attribution output belonging to `generation`.
    ///
    /// Output from a superseded load is dropped.
    pub fn ingest(
        &mut self,
        generation: u64,
        parser: &mut IncrementalParser,
        line: &str,
        commits: &mut CommitStore,
    ) -> bool {
        if !self.is_current_load(generation) {
            return false;
        }
        parser.feed_line(line, &mut self.lines, commits);
        true
    }

    /// Complete the load identified by `generation`.
    ///
    /// Queued edits are replayed in arrival order before the state becomes
    /// [`LoadState::Done`]. The returned observers must be notified by the
    /// caller; they are never notified before the replay.
    pub fn finish_load(
        &mut self,
        generation: u64,
        outcome: LoadOutcome,
    ) -> Vec<oneshot::Sender<()>> {
        if !self.is_current_load(generation) {
            return Vec::new();
        }

        match outcome {
            LoadOutcome::Untracked => {
                self.tracked = TrackedState::No;
                self.lines.clear();
                self.pending_edits.clear();
            }
            LoadOutcome::Complete | LoadOutcome::Failed => {
                if outcome == LoadOutcome::Complete {
                    self.tracked = TrackedState::Yes;
                }
                while let Some(change) = self.pending_edits.pop_front() {
                    apply_change(&mut self.lines, &change);
                }
            }
        }

        self.state = LoadState::Done;
        self.generation = None;
        self.last_outcome = Some(outcome);
        std::mem::take(&mut self.observers)
    }

    /// Apply or queue a live edit.
    pub fn apply_change(&mut self, change: ContentChange) {
        self.edited_since_load = true;
        if self.tracked == TrackedState::No {
            return;
        }
        if self.is_loading() {
            self.pending_edits.push_back(change);
        } else {
            apply_change(&mut self.lines, &change);
        }
    }

    /// The document now has unsaved modifications.
    ///
    /// Ignored while loading; queued edits already cover that case.
    pub fn mark_dirty(&mut self) {
        if !self.is_loading() {
            self.state = LoadState::Dirty;
        }
    }

    pub fn set_tracked(&mut self, tracked: TrackedState) {
        self.tracked = tracked;
        if tracked == TrackedState::No {
            self.lines.clear();
        }
    }

    /// Register an observer to be woken when the current load finishes.
    ///
    /// Returns the sender back if no load is in flight.
    pub fn add_observer(
        &mut self,
        observer: oneshot::Sender<()>,
    ) -> Result<(), oneshot::Sender<()>> {
        if self.is_loading() {
            self.observers.push(observer);
            Ok(())
        } else {
            Err(observer)
        }
    }

    /// Resolve the attribution of `line`.
    pub fn attribution(
        &self,
        line: usize,
        commits: &CommitStore,
        user_email: Option<&str>,
    ) -> LineAttribution {
        if self.tracked == TrackedState::No {
            return LineAttribution::Untracked;
        }
        match (self.ref_at(line), self.state) {
            (Some(Ref::Uncommitted), _) => LineAttribution::Uncommitted,
            (Some(Ref::Committed(id)), _) => match commits.get(id) {
                Some(commit) => LineAttribution::Commit {
                    revision: id.clone(),
                    commit: commit.clone(),
                    is_self: user_email.is_some_and(|email| commit.is_authored_by(email)),
                },
                None => LineAttribution::Failed,
            },
            (None, LoadState::Unknown | LoadState::Loading) => LineAttribution::Loading,
            (None, LoadState::Dirty) => LineAttribution::Dirty,
            (None, LoadState::Done) => LineAttribution::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(file: &mut FileBlame, generation: u64, stream: &str, commits: &mut CommitStore) {
        let mut parser = IncrementalParser::new();
        for line in stream.lines() {
            assert!(file.ingest(generation, &mut parser, line, commits));
        }
        parser.finish();
    }

    const STREAM: &str = "aaa1111 1 1 3\nauthor Alice\nauthor-mail <alice@example.com>\nfilename f.rs\n";

    #[test]
    fn test_load_lifecycle() {
        let mut file = FileBlame::new();
        let mut commits = CommitStore::new();
        assert_eq!(file.state(), LoadState::Unknown);

        assert!(file.begin_load(1, 3));
        assert!(!file.begin_load(2, 3));
        assert_eq!(file.attribution(0, &commits, None), LineAttribution::Loading);

        load(&mut file, 1, STREAM, &mut commits);
        let observers = file.finish_load(1, LoadOutcome::Complete);
        assert!(observers.is_empty());

        assert_eq!(file.state(), LoadState::Done);
        assert_eq!(file.tracked(), TrackedState::Yes);
        assert_eq!(file.lines().len(), 3);
        match file.attribution(2, &commits, Some("ALICE@example.com")) {
            LineAttribution::Commit { revision, is_self, .. } => {
                assert_eq!(revision, "aaa1111");
                assert!(is_self);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_edits_queue_while_loading() {
        let mut file = FileBlame::new();
        let mut commits = CommitStore::new();
        file.begin_load(7, 3);

        file.apply_change(ContentChange::new(0, 0, "x\ny"));
        assert_eq!(file.pending_edits(), 1);
        assert!(file.lines().iter().all(Option::is_none));

        load(&mut file, 7, STREAM, &mut commits);
        file.finish_load(7, LoadOutcome::Complete);

        assert_eq!(file.pending_edits(), 0);
        assert_eq!(
            file.lines(),
            &[
                Some(Ref::Uncommitted),
                Some(Ref::Uncommitted),
                Some(Ref::Committed("aaa1111".to_string())),
                Some(Ref::Committed("aaa1111".to_string())),
            ]
        );
        assert!(file.edited_since_load());
    }

    #[test]
    fn test_queued_edits_match_sequential_application() {
        let stream = "aaa1111 1 1 2\nauthor Alice\nfilename f.rs\nbbb2222 3 3 3\nauthor Bob\nfilename f.rs\n";
        let changes = [
            ContentChange::new(1, 1, "x\ny\nz"),
            ContentChange::new(0, 0, ""),
            ContentChange::new(4, 5, "joined"),
            ContentChange::new(3, 3, "edited"),
        ];

        let mut reference = FileBlame::new();
        let mut reference_commits = CommitStore::new();
        reference.begin_load(1, 5);
        load(&mut reference, 1, stream, &mut reference_commits);
        reference.finish_load(1, LoadOutcome::Complete);
        let mut expected = reference.lines().to_vec();
        for change in &changes {
            apply_change(&mut expected, change);
        }

        let mut file = FileBlame::new();
        let mut commits = CommitStore::new();
        file.begin_load(2, 5);
        for change in changes.iter().cloned() {
            file.apply_change(change);
        }
        assert_eq!(file.pending_edits(), 4);
        load(&mut file, 2, stream, &mut commits);
        file.finish_load(2, LoadOutcome::Complete);

        assert_eq!(file.lines(), expected.as_slice());
        assert_eq!(file.lines().len(), 6);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut file = FileBlame::new();
        let mut commits = CommitStore::new();
        file.begin_load(1, 1);

        let mut parser = IncrementalParser::new();
        assert!(!file.ingest(2, &mut parser, "aaa1111 1 1 1", &mut commits));
        assert!(file.finish_load(2, LoadOutcome::Complete).is_empty());
        assert!(file.is_loading());
    }

    #[test]
    fn test_untracked_outcome() {
        let mut file = FileBlame::new();
        let commits = CommitStore::new();
        file.begin_load(1, 4);
        file.apply_change(ContentChange::new(0, 0, "x"));
        file.finish_load(1, LoadOutcome::Untracked);

        assert_eq!(file.tracked(), TrackedState::No);
        assert!(file.lines().is_empty());
        assert_eq!(file.attribution(0, &commits, None), LineAttribution::Untracked);

        file.apply_change(ContentChange::new(0, 0, "y"));
        assert!(file.lines().is_empty());
    }

    #[test]
    fn test_failed_outcome_reports_failed_lines() {
        let mut file = FileBlame::new();
        let mut commits = CommitStore::new();
        file.begin_load(1, 3);
        load(&mut file, 1, "aaa1111 1 1 1\nfilename f.rs\n", &mut commits);
        file.finish_load(1, LoadOutcome::Failed);

        assert!(matches!(
            file.attribution(0, &commits, None),
            LineAttribution::Commit { .. }
        ));
        assert_eq!(file.attribution(1, &commits, None), LineAttribution::Failed);
        assert_eq!(file.attribution(10, &commits, None), LineAttribution::Failed);
    }

    #[test]
    fn test_dirty_keeps_patched_lines() {
        let mut file = FileBlame::new();
        let commits = CommitStore::new();
        file.mark_dirty();
        assert_eq!(file.attribution(0, &commits, None), LineAttribution::Dirty);

        file.apply_change(ContentChange::new(0, 0, "typed"));
        assert_eq!(file.attribution(0, &commits, None), LineAttribution::Uncommitted);
        assert_eq!(file.attribution(1, &commits, None), LineAttribution::Dirty);
    }

    #[test]
    fn test_observers_returned_on_finish() {
        let mut file = FileBlame::new();
        let (tx, _rx) = oneshot::channel();
        assert!(file.add_observer(tx).is_err());

        file.begin_load(1, 0);
        let (tx, _rx) = oneshot::channel();
        assert!(file.add_observer(tx).is_ok());
        assert_eq!(file.finish_load(1, LoadOutcome::Complete).len(), 1);
    }
}
