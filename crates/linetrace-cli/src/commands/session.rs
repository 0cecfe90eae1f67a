//! Session command: a JSON-lines protocol over stdin/stdout.
//!
//! Each input line is one request object tagged by `method`. Notifications
//! are applied in arrival order; queries run concurrently and answer through
//! a shared writer, so every response echoes the request `id`.

use super::{build_service, GlobalOptions};
use anyhow::Result;
use linetrace_core::{
    BlameService, ContentChange, DocumentInfo, ObserverId, ReloadOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<u64>,
    #[serde(flatten)]
    request: Request,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
enum Request {
    Opened(DocumentInfo),
    Saved(DocumentInfo),
    Reload {
        #[serde(flatten)]
        doc: DocumentInfo,
        #[serde(default)]
        force: bool,
    },
    Change {
        path: PathBuf,
        change: ContentChange,
    },
    Closed {
        path: PathBuf,
    },
    RepositoryClosed {
        root: PathBuf,
    },
    ClearCache,
    Line {
        path: PathBuf,
        line: usize,
        #[serde(default)]
        observer: Option<u64>,
    },
    Message {
        path: PathBuf,
        revision: String,
    },
    Status {
        path: PathBuf,
    },
    Wait {
        path: PathBuf,
    },
}

impl Request {
    fn is_query(&self) -> bool {
        matches!(
            self,
            Request::Line { .. } | Request::Message { .. } | Request::Wait { .. }
        )
    }
}

#[derive(Debug, Serialize)]
struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Response {
    fn from_result(id: Option<u64>, result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self {
                id,
                ok: true,
                result: Some(value),
                error: None,
            },
            Err(e) => Self {
                id,
                ok: false,
                result: None,
                error: Some(format!("{:#}", e)),
            },
        }
    }
}

/// Run the session command.
pub async fn run(options: &GlobalOptions) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let service = build_service(options.load_config(&cwd)?);
    tracing::info!("Session started");

    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = rx.recv().await {
            let mut line = match serde_json::to_vec(&response) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode response");
                    continue;
                }
            };
            line.push(b'\n');
            if stdout.write_all(&line).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut queries = Vec::new();
    while let Some(line) = input.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let envelope: Envelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                let _ = tx.send(Response::from_result(None, Err(e.into())));
                continue;
            }
        };
        tracing::debug!(id = ?envelope.id, request = ?envelope.request, "Request");

        if envelope.request.is_query() {
            let service = service.clone();
            let tx = tx.clone();
            queries.push(tokio::spawn(async move {
                let result = dispatch(&service, envelope.request).await;
                let _ = tx.send(Response::from_result(envelope.id, result));
            }));
        } else {
            let result = dispatch(&service, envelope.request).await;
            let _ = tx.send(Response::from_result(envelope.id, result));
        }
    }

    for query in queries {
        let _ = query.await;
    }
    drop(tx);
    let _ = writer.await;
    tracing::info!("Session ended");
    Ok(())
}

async fn dispatch(service: &BlameService, request: Request) -> Result<Value> {
    let value = match request {
        Request::Opened(doc) => {
            service.notify_document_opened(&doc).await?;
            Value::Null
        }
        Request::Saved(doc) => {
            service.notify_document_saved(&doc).await?;
            Value::Null
        }
        Request::Reload { doc, force } => {
            service
                .notify_reload_requested(&doc, ReloadOptions { force })
                .await?;
            Value::Null
        }
        Request::Change { path, change } => {
            service.notify_content_change(&path, change)?;
            Value::Null
        }
        Request::Closed { path } => {
            service.notify_document_closed(&path);
            Value::Null
        }
        Request::RepositoryClosed { root } => {
            service.notify_repository_closed(&root);
            Value::Null
        }
        Request::ClearCache => {
            service.notify_cache_clear();
            Value::Null
        }
        Request::Line {
            path,
            line,
            observer: Some(observer),
        } => serde_json::to_value(service.annotate(ObserverId(observer), &path, line).await?)?,
        Request::Line {
            path,
            line,
            observer: None,
        } => serde_json::to_value(service.line_attribution(&path, line)?)?,
        Request::Message { path, revision } => {
            Value::String(service.request_commit_message(&path, &revision).await?)
        }
        Request::Status { path } => serde_json::to_value(service.file_status(&path))?,
        Request::Wait { path } => {
            service.wait_until_loaded(&path).await?;
            serde_json::to_value(service.file_status(&path))?
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requests() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"id":1,"method":"opened","path":"/r/a.rs","line_count":3}"#,
        )
        .unwrap();
        assert_eq!(envelope.id, Some(1));
        match envelope.request {
            Request::Opened(doc) => {
                assert_eq!(doc.path, PathBuf::from("/r/a.rs"));
                assert!(!doc.dirty);
            }
            other => panic!("unexpected {:?}", other),
        }

        let envelope: Envelope = serde_json::from_str(
            r#"{"method":"change","path":"/r/a.rs","change":{"start_line":0,"end_line":1,"text":"x"}}"#,
        )
        .unwrap();
        assert!(envelope.id.is_none());
        assert!(matches!(envelope.request, Request::Change { .. }));

        let envelope: Envelope = serde_json::from_str(
            r#"{"id":2,"method":"reload","path":"/r/a.rs","line_count":3,"force":true}"#,
        )
        .unwrap();
        assert!(matches!(envelope.request, Request::Reload { force: true, .. }));
        assert!(!envelope.request.is_query());

        let envelope: Envelope =
            serde_json::from_str(r#"{"id":3,"method":"line","path":"/r/a.rs","line":4,"observer":9}"#)
                .unwrap();
        assert!(envelope.request.is_query());
    }

    #[test]
    fn test_error_response_shape() {
        let response = Response::from_result(Some(5), Err(anyhow::anyhow!("boom")));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"id": 5, "ok": false, "error": "boom"}));
    }
}
