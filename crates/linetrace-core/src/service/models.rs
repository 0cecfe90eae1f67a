use crate::file_state::{LineAttribution, LoadState, TrackedState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An open document as the host editor sees it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub line_count: usize,
    #[serde(default)]
    pub dirty: bool,
}

impl DocumentInfo {
    pub fn new(path: impl Into<PathBuf>, line_count: usize) -> Self {
        Self {
            path: path.into(),
            line_count,
            dirty: false,
        }
    }

    pub fn with_dirty(mut self, dirty: bool) -> Self {
        self.dirty = dirty;
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadOptions {
    /// Reload even when the document has unsaved changes.
    #[serde(default)]
    pub force: bool,
}

/// Everything needed to render one line's annotation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineAnnotation {
    pub line: usize,
    pub attribution: LineAttribution,
    /// Commit message in presentation form, for committed lines.
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub state: LoadState,
    pub tracked: TrackedState,
    pub line_count: usize,
    pub pending_edits: usize,
}
