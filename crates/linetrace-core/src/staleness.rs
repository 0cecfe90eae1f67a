//! Staleness tokens for asynchronous per-observer updates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifies one consumer of attributions, e.g. an editor view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObserverId(pub u64);

/// Token for one update started on behalf of an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateTicket {
    observer: ObserverId,
    generation: u64,
}

/// Hands out tickets so that only an observer's newest update may complete.
#[derive(Debug, Default)]
pub struct UpdateTracker {
    next_generation: u64,
    generations: HashMap<ObserverId, u64>,
}

impl UpdateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an update, superseding every earlier ticket of `observer`.
    pub fn begin(&mut self, observer: ObserverId) -> UpdateTicket {
        self.next_generation += 1;
        self.generations.insert(observer, self.next_generation);
        UpdateTicket {
            observer,
            generation: self.next_generation,
        }
    }

    /// Whether no newer update was started since `ticket`.
    pub fn is_current(&self, ticket: &UpdateTicket) -> bool {
        self.generations.get(&ticket.observer) == Some(&ticket.generation)
    }

    /// Invalidate every outstanding ticket of `observer`.
    pub fn forget(&mut self, observer: ObserverId) {
        self.generations.remove(&observer);
    }

    pub fn clear(&mut self) {
        self.generations.clear();
    }
}
