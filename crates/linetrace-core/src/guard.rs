//! Runaway invocation guard.
//!
//! Counts how often each operation is triggered inside a sliding window and
//! trips once any of them exceeds the limit. A tripped guard stays tripped.

use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Sliding-window invocation quota.
#[derive(Debug)]
pub struct RunawayGuard {
    limit: usize,
    window: Duration,
    hits: HashMap<&'static str, VecDeque<Instant>>,
    tripped: bool,
}

impl RunawayGuard {
    /// Allow at most `limit` invocations of one operation per `window`.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: HashMap::new(),
            tripped: false,
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Record an invocation of `operation` now.
    pub fn record(&mut self, operation: &'static str) -> Result<()> {
        self.record_at(operation, Instant::now())
    }

    /// Record an invocation of `operation` at `now`.
    pub fn record_at(&mut self, operation: &'static str, now: Instant) -> Result<()> {
        if self.tripped {
            return Err(Error::Disabled);
        }

        let window = self.window;
        let hits = self.hits.entry(operation).or_default();
        while let Some(oldest) = hits.front() {
            if now.saturating_duration_since(*oldest) >= window {
                hits.pop_front();
            } else {
                break;
            }
        }
        hits.push_back(now);

        if hits.len() > self.limit {
            self.tripped = true;
            return Err(Error::Runaway {
                operation: operation.to_string(),
                count: hits.len(),
                window_ms: window.as_millis() as u64,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_when_limit_exceeded() {
        let mut guard = RunawayGuard::new(3, Duration::from_secs(1));
        let start = Instant::now();
        for i in 0..3 {
            guard.record_at("reload", start + Duration::from_millis(i * 10)).unwrap();
        }

        let err = guard.record_at("reload", start + Duration::from_millis(40)).unwrap_err();
        assert!(matches!(err, Error::Runaway { count: 4, .. }));
        assert!(guard.is_tripped());
        assert!(matches!(guard.record_at("open", start), Err(Error::Disabled)));
    }

    #[test]
    fn test_window_slides() {
        let mut guard = RunawayGuard::new(2, Duration::from_secs(1));
        let start = Instant::now();
        guard.record_at("reload", start).unwrap();
        guard.record_at("reload", start + Duration::from_millis(500)).unwrap();
        guard.record_at("reload", start + Duration::from_millis(1000)).unwrap();
        guard.record_at("reload", start + Duration::from_millis(1600)).unwrap();
        assert!(!guard.is_tripped());
    }

    #[test]
    fn test_operations_counted_separately() {
        let mut guard = RunawayGuard::new(1, Duration::from_secs(1));
        let now = Instant::now();
        guard.record_at("open", now).unwrap();
        guard.record_at("save", now).unwrap();
        assert!(guard.record_at("open", now).is_err());
    }
}
