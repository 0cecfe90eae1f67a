//! Presentation helpers for commit metadata.
//!
//! Everything here is a pure function of its inputs, so the output can be
//! cached on the commit record and recomputed freely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the repository is hosted, used to link issue references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Web URL of the repository, e.g. `https://github.com/owner/repo`.
    pub base_url: String,
}

impl HostInfo {
    /// Derive the web URL from a remote URL.
    ///
    /// Accepts `git@host:owner/repo.git`, `ssh://git@host/owner/repo.git`
    /// and `https://[user@]host/owner/repo.git` forms.
    pub fn from_remote_url(remote: &str) -> Option<Self> {
        let remote = remote.trim();
        let (host, path) = if let Some(rest) = remote
            .strip_prefix("https://")
            .or_else(|| remote.strip_prefix("http://"))
            .or_else(|| remote.strip_prefix("ssh://"))
            .or_else(|| remote.strip_prefix("git://"))
        {
            let rest = rest.rsplit_once('@').map_or(rest, |(_, r)| r);
            rest.split_once('/')?
        } else {
            let (user_host, path) = remote.split_once(':')?;
            if user_host.contains('/') {
                return None;
            }
            let host = user_host.rsplit_once('@').map_or(user_host, |(_, h)| h);
            (host, path)
        };

        // Drop an explicit port from ssh:// style URLs.
        let host = host.split(':').next()?;
        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        if host.is_empty() || path.is_empty() {
            return None;
        }
        Some(Self {
            base_url: format!("https://{}/{}", host, path),
        })
    }

    pub fn issue_url(&self, number: &str) -> String {
        format!("{}/issues/{}", self.base_url, number)
    }

    pub fn commit_url(&self, revision: &str) -> String {
        format!("{}/commit/{}", self.base_url, revision)
    }
}

/// Turn a raw commit message into its Markdown presentation form.
///
/// Line endings are normalized, trailing whitespace and blank edges removed,
/// single newlines inside a paragraph become hard breaks and `#123` issue
/// references are linked when the host is known. Applying it to its own
/// output returns the output unchanged.
pub fn present_message(raw: &str, host: Option<&HostInfo>) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.lines().map(str::trim_end).collect();

    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    let (first, last) = match (first, last) {
        (Some(first), Some(last)) => (first, last),
        _ => return String::new(),
    };

    let body = &lines[first..=last];
    let mut out = String::with_capacity(normalized.len());
    for (i, line) in body.iter().enumerate() {
        match host {
            Some(host) => out.push_str(&link_issues(line, host)),
            None => out.push_str(line),
        }
        if let Some(next) = body.get(i + 1) {
            if !line.is_empty() && !next.is_empty() {
                out.push_str("  ");
            }
            out.push('\n');
        }
    }
    out
}

fn link_issues(line: &str, host: &HostInfo) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    let mut prev: Option<char> = None;

    while let Some(pos) = rest.find('#') {
        let (before, after_hash) = rest.split_at(pos);
        out.push_str(before);
        let prev_char = before.chars().last().or(prev);
        let digits_len = after_hash[1..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let number = &after_hash[1..1 + digits_len];
        let next = after_hash[1 + digits_len..].chars().next();

        let opens_ref = prev_char.map_or(true, |c| c.is_whitespace() || c == '(');
        let closes_ref = next.map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
        if digits_len > 0 && opens_ref && closes_ref {
            out.push_str(&format!("[#{}]({})", number, host.issue_url(number)));
            rest = &after_hash[1 + digits_len..];
            prev = number.chars().last();
        } else {
            out.push('#');
            rest = &after_hash[1..];
            prev = Some('#');
        }
    }
    out.push_str(rest);
    out
}

/// Human readable age of a timestamp, e.g. `3 days ago`.
pub fn format_relative(timestamp_seconds: i64, now: DateTime<Utc>) -> String {
    let elapsed = now.timestamp().saturating_sub(timestamp_seconds);
    if elapsed < 60 {
        return "just now".to_string();
    }

    const UNITS: [(i64, &str); 6] = [
        (365 * 24 * 3600, "year"),
        (30 * 24 * 3600, "month"),
        (7 * 24 * 3600, "week"),
        (24 * 3600, "day"),
        (3600, "hour"),
        (60, "minute"),
    ];
    for (seconds, name) in UNITS {
        let count = elapsed / seconds;
        if count >= 1 {
            let plural = if count == 1 { "" } else { "s" };
            return format!("{} {}{} ago", count, name, plural);
        }
    }
    "just now".to_string()
}
