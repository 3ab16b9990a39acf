//! Per-run ticket actionability cache.
//!
//! Candidate pools repeat the same handful of tickets, so within one triage
//! run each key is looked up live once and memoized. The cache is created
//! for a run and dropped with it: stale status within a run is acceptable,
//! across runs it is not.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::domain::TicketKey;
use crate::ports::tracker::TicketTracker;

pub struct TicketStatusCache {
    entries: HashMap<TicketKey, bool>,
    /// Keys treated as actionable without any lookup.
    pinned: HashSet<TicketKey>,
}

impl TicketStatusCache {
    pub fn new(pinned: impl IntoIterator<Item = TicketKey>) -> Self {
        Self {
            entries: HashMap::new(),
            pinned: pinned.into_iter().collect(),
        }
    }

    /// Whether `key` is actionable: it exists and is not closed. The first
    /// call per key hits the tracker; later calls return the memoized
    /// answer. Lookup failures (deleted ticket, malformed key, transport
    /// trouble) memoize as not actionable; one bad reference must never
    /// abort a batch.
    pub async fn resolve(&mut self, tracker: &dyn TicketTracker, key: &TicketKey) -> bool {
        if self.pinned.contains(key) {
            return true;
        }
        if let Some(&actionable) = self.entries.get(key) {
            return actionable;
        }

        let actionable = match tracker.get_issue(key).await {
            Ok(snapshot) => !snapshot.is_closed(),
            Err(e) => {
                debug!(ticket = %key, error = %e, "status lookup failed; not actionable");
                false
            }
        };
        self.entries.insert(key.clone(), actionable);
        actionable
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
