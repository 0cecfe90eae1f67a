//! End-to-end tests for the Linetrace cache.
//!
//! These drive the public API: stream parsing into a line map, live edit
//! patching, and the service against an in-process backend.

use async_trait::async_trait;
use linetrace_core::{
    apply_change, AttributionStream, BlameConfig, BlameExit, BlameOptions, BlameService,
    CommitStore, ContentChange, DocumentInfo, GitBackend, HostInfo, IncrementalParser,
    LineAttribution, Ref, RepoInfo, Result, UNCOMMITTED_ID,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FIRST: &str = "1111111111111111111111111111111111111111";
const SECOND: &str = "2222222222222222222222222222222222222222";

fn stream() -> String {
    format!(
        "{first} 1 1 2\n\
         author Ada\n\
         author-mail <ada@example.com>\n\
         author-time 1700000000\n\
         author-tz +0100\n\
         committer Ada\n\
         summary Add parser\n\
         boundary\n\
         filename src/lib.rs\n\
         {second} 3 3 2\n\
         author Grace\n\
         author-mail <grace@example.com>\n\
         author-time 1700050000\n\
         summary Rename module\n\
         previous {first} src/old name.rs\n\
         filename src/lib.rs\n\
         {first} 5 5 1\n\
         filename src/lib.rs\n\
         {uncommitted} 6 6 1\n\
         author Not Committed Yet\n\
         filename src/lib.rs\n",
        first = FIRST,
        second = SECOND,
        uncommitted = UNCOMMITTED_ID,
    )
}

fn parse(text: &str, lines: &mut Vec<Option<Ref>>, commits: &mut CommitStore) {
    let mut parser = IncrementalParser::new();
    for line in text.lines() {
        parser.feed_line(line, lines, commits);
    }
    parser.finish();
}

#[test]
fn test_full_stream_into_line_map() {
    let mut lines = vec![None; 6];
    let mut commits = CommitStore::new();
    parse(&stream(), &mut lines, &mut commits);

    let first = Some(Ref::Committed(FIRST.to_string()));
    let second = Some(Ref::Committed(SECOND.to_string()));
    assert_eq!(
        lines,
        vec![
            first.clone(),
            first.clone(),
            second.clone(),
            second,
            first,
            Some(Ref::Uncommitted)
        ]
    );

    assert_eq!(commits.len(), 2);
    let renamed = commits.get(SECOND).unwrap();
    assert_eq!(renamed.author, "Grace");
    assert_eq!(renamed.previous_path.as_deref(), Some("src/old name.rs"));
    assert_eq!(renamed.short_id(), "2222222");
    assert!(commits.get(UNCOMMITTED_ID).is_none());
}

#[test]
fn test_reparse_keeps_first_metadata() {
    let mut lines = vec![None; 6];
    let mut commits = CommitStore::new();
    parse(&stream(), &mut lines, &mut commits);

    let rewritten = stream().replace("summary Add parser", "summary Something else");
    let mut again = vec![None; 6];
    parse(&rewritten, &mut again, &mut commits);

    assert_eq!(lines, again);
    assert_eq!(commits.len(), 2);
    assert_eq!(commits.get(FIRST).unwrap().summary, "Add parser");
}

#[test]
fn test_edits_follow_document_shape() {
    let mut lines = vec![None; 6];
    let mut commits = CommitStore::new();
    parse(&stream(), &mut lines, &mut commits);

    // Join lines 2 and 3, then insert two lines at the top.
    apply_change(&mut lines, &ContentChange::new(2, 3, "merged"));
    assert_eq!(lines.len(), 5);
    apply_change(&mut lines, &ContentChange::new(0, 0, "a\nb\nc"));
    assert_eq!(lines.len(), 7);

    let uncommitted: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, r)| r.as_ref().is_some_and(Ref::is_uncommitted))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(uncommitted, vec![0, 1, 2, 4, 6]);
    assert_eq!(lines[3], Some(Ref::Committed(FIRST.to_string())));
}

/// Backend serving one canned stream for every file under `/work`.
struct CannedBackend {
    output: String,
}

struct CannedStream {
    lines: VecDeque<String>,
}

#[async_trait]
impl AttributionStream for CannedStream {
    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }

    async fn finish(self: Box<Self>) -> Result<BlameExit> {
        Ok(BlameExit::Success)
    }
}

#[async_trait]
impl GitBackend for CannedBackend {
    async fn discover(&self, path: &Path) -> Result<Option<RepoInfo>> {
        Ok(path.starts_with("/work").then(|| RepoInfo {
            root: PathBuf::from("/work"),
            user_email: Some("grace@example.com".to_string()),
            host: HostInfo::from_remote_url("https://gitlab.com/group/project.git"),
        }))
    }

    async fn head(&self, _root: &Path) -> Result<Option<String>> {
        Ok(Some(FIRST.to_string()))
    }

    async fn blame(
        &self,
        _root: &Path,
        _path: &Path,
        _options: BlameOptions,
    ) -> Result<Box<dyn AttributionStream>> {
        Ok(Box::new(CannedStream {
            lines: self.output.lines().map(str::to_string).collect(),
        }))
    }

    async fn commit_message(&self, _root: &Path, _revision: &str) -> Result<String> {
        Ok("Rename module\n\nCloses #4".to_string())
    }

    async fn is_tracked(&self, _root: &Path, _path: &Path) -> Result<bool> {
        Ok(true)
    }
}

#[tokio::test]
async fn test_service_round_trip() {
    let backend = Arc::new(CannedBackend { output: stream() });
    let service = BlameService::new(backend, BlameConfig::default());
    let path = PathBuf::from("/work/src/lib.rs");

    service
        .notify_document_opened(&DocumentInfo::new(path.clone(), 6))
        .await
        .unwrap();
    service.wait_until_loaded(&path).await.unwrap();

    match service.line_attribution(&path, 3).unwrap() {
        LineAttribution::Commit { revision, is_self, .. } => {
            assert_eq!(revision, SECOND);
            assert!(is_self);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(service.line_attribution(&path, 5).unwrap(), LineAttribution::Uncommitted);

    let message = service.request_commit_message(&path, SECOND).await.unwrap();
    assert_eq!(
        message,
        "Rename module\n\nCloses [#4](https://gitlab.com/group/project/issues/4)"
    );

    service
        .notify_content_change(&path, ContentChange::new(0, 0, "edited"))
        .unwrap();
    assert_eq!(service.line_attribution(&path, 0).unwrap(), LineAttribution::Uncommitted);
}
