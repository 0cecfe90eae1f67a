//! Reload decisions.
//!
//! Given a file's current state and a trigger, decide whether to reuse the
//! cached attribution, start a new load, or only record that the document is
//! dirty. A file that is already loading never gets a second load.

use crate::file_state::{FileBlame, LoadState, TrackedState};

/// Event that may require fresh attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The document was opened or focused.
    Opened { dirty: bool },
    /// The document was written to disk.
    Saved,
    /// The user asked for a reload.
    Reload { force: bool },
}

/// What to do for a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Cached attribution is still valid.
    Reuse,
    /// A load is in flight; wait for it instead of starting another.
    Join,
    /// Spawn an attribution run.
    Load,
    /// Record unsaved changes; probe tracking first if it is unknown.
    MarkDirty { probe_tracked: bool },
}

/// Reload policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coordinator {
    /// Reload on every save instead of only after unsaved edits.
    pub reblame_on_save: bool,
}

impl Coordinator {
    pub fn new(reblame_on_save: bool) -> Self {
        Self { reblame_on_save }
    }

    pub fn decide(&self, file: Option<&FileBlame>, trigger: Trigger) -> Action {
        if file.is_some_and(FileBlame::is_loading) {
            return Action::Join;
        }
        let state = file.map_or(LoadState::Unknown, FileBlame::state);
        let tracked = file.map_or(TrackedState::Unknown, FileBlame::tracked);

        match trigger {
            Trigger::Opened { dirty: true } => Action::MarkDirty {
                probe_tracked: tracked == TrackedState::Unknown,
            },
            Trigger::Opened { dirty: false } => match state {
                LoadState::Done => Action::Reuse,
                LoadState::Unknown | LoadState::Dirty | LoadState::Loading => Action::Load,
            },
            Trigger::Saved => {
                let edited = file.is_some_and(FileBlame::edited_since_load);
                if self.reblame_on_save
                    || edited
                    || matches!(state, LoadState::Dirty | LoadState::Unknown)
                {
                    Action::Load
                } else {
                    Action::Reuse
                }
            }
            Trigger::Reload { force: true } => Action::Load,
            Trigger::Reload { force: false } => match state {
                LoadState::Dirty => Action::Reuse,
                _ => Action::Load,
            },
        }
    }
}
