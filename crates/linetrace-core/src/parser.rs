//! Streaming parser for `git blame --incremental` output.
//!
//! The stream is a sequence of entries. Each entry is a header line
//! `<rev> <orig-line> <final-line> <count>` followed by `<tag> <value>` lines
//! and terminated by a `filename <path>` line. The parser is fed one line at a
//! time and keeps the entry being read in its own state, so nothing it writes
//! to the line map or the commit store is ever half-populated between lines.

use crate::commits::CommitStore;
use crate::revision::{Commit, Ref};

/// Upper bound on line numbers accepted from a header or an edit.
pub(crate) const MAX_ATTRIBUTED_LINES: usize = 1 << 24;

/// A parsed entry header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Revision the entry's lines are attributed to.
    pub revision: Ref,
    /// Zero-based first line in the final file.
    pub start: usize,
    /// Number of consecutive lines covered.
    pub count: usize,
}

impl EntryHeader {
    /// Parse a header line, returning `None` if it is not one.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let id = fields.next()?;
        let _orig_line = fields.next()?.parse::<usize>().ok()?;
        let final_line = fields.next()?.parse::<usize>().ok()?;
        let count = fields.next()?.parse::<usize>().ok()?;

        if !id.bytes().all(|b| b.is_ascii_hexdigit()) || final_line == 0 {
            return None;
        }
        let start = final_line - 1;
        match start.checked_add(count) {
            Some(end) if end <= MAX_ATTRIBUTED_LINES => Some(Self {
                revision: Ref::parse(id),
                start,
                count,
            }),
            _ => None,
        }
    }

    fn end(&self) -> usize {
        self.start + self.count
    }
}

#[derive(Debug, Default)]
struct EntryTags {
    author: Option<String>,
    email: Option<String>,
    time: Option<i64>,
    summary: Option<String>,
    previous_path: Option<String>,
}

#[derive(Debug)]
struct PendingEntry {
    header: EntryHeader,
    /// Metadata for this revision was already recorded.
    known: bool,
    tags: EntryTags,
}

#[derive(Debug, Default)]
enum ParserState {
    #[default]
    AwaitingHeader,
    InEntry(PendingEntry),
}

/// Totals reported when the stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// Entries completed by a `filename` terminator.
    pub entries: usize,
    /// Commit records created.
    pub commits_created: usize,
    /// Entries dropped because a new header or the end of the stream arrived first.
    pub abandoned: usize,
    /// Lines that were neither a header nor part of an entry.
    pub skipped: usize,
}

/// Incremental blame parser, advanced one line at a time.
#[derive(Debug, Default)]
pub struct IncrementalParser {
    state: ParserState,
    summary: ParseSummary,
}

impl IncrementalParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one line of output.
    ///
    /// Completed entries overwrite their line range in `lines` (growing it with
    /// unattributed slots when needed) and insert a commit record the first
    /// time a revision is seen.
    pub fn feed_line(
        &mut self,
        line: &str,
        lines: &mut Vec<Option<Ref>>,
        commits: &mut CommitStore,
    ) {
        let line = line.trim_end_matches(['\r', '\n']);
        match std::mem::take(&mut self.state) {
            ParserState::AwaitingHeader => self.start_entry(line, commits),
            ParserState::InEntry(mut entry) => {
                let (tag, value) = line.split_once(' ').unwrap_or((line, ""));
                match tag {
                    "filename" => self.complete_entry(entry, value, lines, commits),
                    "author" => {
                        entry.tags.author.get_or_insert_with(|| value.to_string());
                        self.state = ParserState::InEntry(entry);
                    }
                    "author-mail" => {
                        let email = value.trim().trim_start_matches('<').trim_end_matches('>');
                        entry.tags.email.get_or_insert_with(|| email.to_string());
                        self.state = ParserState::InEntry(entry);
                    }
                    "author-time" => {
                        if entry.tags.time.is_none() {
                            entry.tags.time = value.trim().parse().ok();
                        }
                        self.state = ParserState::InEntry(entry);
                    }
                    "summary" => {
                        entry.tags.summary.get_or_insert_with(|| value.trim().to_string());
                        self.state = ParserState::InEntry(entry);
                    }
                    "previous" => {
                        // `previous <rev> <path>`; the path may contain spaces.
                        if let Some((_, path)) = value.split_once(' ') {
                            entry.tags.previous_path = Some(path.to_string());
                        }
                        self.state = ParserState::InEntry(entry);
                    }
                    _ if EntryHeader::parse(line).is_some() => {
                        tracing::debug!(
                            revision = %entry.header.revision,
                            "Blame entry ended without filename, dropping it"
                        );
                        self.summary.abandoned += 1;
                        self.start_entry(line, commits);
                    }
                    _ => {
                        // committer-*, author-tz, boundary and unknown tags
                        self.state = ParserState::InEntry(entry);
                    }
                }
            }
        }
    }

    /// Finish the stream and report totals.
    pub fn finish(mut self) -> ParseSummary {
        if let ParserState::InEntry(entry) = self.state {
            tracing::debug!(
                revision = %entry.header.revision,
                "Blame stream ended inside an entry"
            );
            self.summary.abandoned += 1;
        }
        self.summary
    }

    fn start_entry(&mut self, line: &str, commits: &CommitStore) {
        match EntryHeader::parse(line) {
            Some(header) => {
                let known = match &header.revision {
                    Ref::Committed(id) => commits.contains(id),
                    Ref::Uncommitted => true,
                };
                self.state = ParserState::InEntry(PendingEntry {
                    header,
                    known,
                    tags: EntryTags::default(),
                });
            }
            None => {
                if !line.is_empty() {
                    tracing::debug!(line, "Skipping unexpected blame line");
                }
                self.summary.skipped += 1;
            }
        }
    }

    fn complete_entry(
        &mut self,
        entry: PendingEntry,
        filename: &str,
        lines: &mut Vec<Option<Ref>>,
        commits: &mut CommitStore,
    ) {
        let PendingEntry { header, known, tags } = entry;

        if let Ref::Committed(id) = &header.revision {
            if known {
                if let Some(previous) = &tags.previous_path {
                    commits.fill_previous_path(id, previous);
                }
            } else {
                let created = commits.insert_if_absent(Commit {
                    id: id.clone(),
                    author: tags.author.unwrap_or_default(),
                    email: tags.email.unwrap_or_default(),
                    timestamp_seconds: tags.time.unwrap_or_default(),
                    summary: tags.summary.unwrap_or_default(),
                    path: filename.to_string(),
                    previous_path: tags.previous_path,
                    message: None,
                });
                if created {
                    self.summary.commits_created += 1;
                }
            }
        }

        if lines.len() < header.end() {
            lines.resize(header.end(), None);
        }
        for slot in &mut lines[header.start..header.end()] {
            *slot = Some(header.revision.clone());
        }
        self.summary.entries += 1;
    }
}
