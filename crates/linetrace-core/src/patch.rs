//! Incremental patching of line attributions for live edits.

use crate::parser::MAX_ATTRIBUTED_LINES;
use crate::revision::Ref;
use serde::{Deserialize, Serialize};

/// A content change reported by the editor.
///
/// Lines `start_line..=end_line` (zero-based, inclusive) are replaced by
/// `text`, which may span several lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

impl ContentChange {
    pub fn new(start_line: usize, end_line: usize, text: impl Into<String>) -> Self {
        Self {
            start_line,
            end_line: end_line.max(start_line),
            text: text.into(),
        }
    }

    /// Number of lines the replacement text occupies.
    pub fn replacement_lines(&self) -> usize {
        self.text.split('\n').count()
    }

    /// Last line covered by the replacement.
    pub fn new_end_line(&self) -> usize {
        self.start_line.saturating_add(self.replacement_lines() - 1)
    }

    /// Whether both the replaced and the replacement ranges fit in a line map.
    pub fn is_in_range(&self) -> bool {
        self.replaced_end_line() < MAX_ATTRIBUTED_LINES && self.new_end_line() < MAX_ATTRIBUTED_LINES
    }

    /// Net change in document line count.
    pub fn line_delta(&self) -> isize {
        self.new_end_line() as isize - self.replaced_end_line() as isize
    }

    fn replaced_end_line(&self) -> usize {
        self.end_line.max(self.start_line)
    }
}

/// Apply a change to a line map in place.
///
/// Every line the change touches becomes [`Ref::Uncommitted`]. Deletions
/// shrink the map and insertions add uncommitted lines, so the map length
/// follows the document's line count. Changes reaching past the largest
/// supported line number are dropped.
pub fn apply_change(lines: &mut Vec<Option<Ref>>, change: &ContentChange) {
    if !change.is_in_range() {
        tracing::warn!(
            start_line = change.start_line,
            end_line = change.end_line,
            "Ignoring out-of-range content change"
        );
        return;
    }
    let start = change.start_line;
    let end = change.replaced_end_line();
    let new_end = change.new_end_line();

    if lines.len() <= end {
        lines.resize(end + 1, None);
    }

    for slot in &mut lines[start..=end.min(new_end)] {
        *slot = Some(Ref::Uncommitted);
    }

    if new_end < end {
        lines.drain(new_end + 1..=end);
    } else if new_end > end {
        let added = std::iter::repeat(Some(Ref::Uncommitted)).take(new_end - end);
        lines.splice(end + 1..end + 1, added);
    }
}
