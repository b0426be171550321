//! Bounded memory of already-handled event ids.
//!
//! The feed re-reports the same events on every poll until they age out of
//! its reporting window, so event identity is the correctness anchor for
//! not re-alerting. Retention is insertion-ordered and count-bounded: the
//! feed is queried per-day, so an id evicted by compaction can only
//! resurface within the same day.

use std::collections::{HashSet, VecDeque};

pub struct DedupStore {
    ceiling: usize,
    // Membership in `ids`, insertion order in `order`. The two are kept in
    // lockstep by `mark` and `compact`.
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl DedupStore {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            ids: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Pure membership check. Empty ids are always novel: two unrelated
    /// events that both lack an id must not suppress each other.
    pub fn seen(&self, event_id: &str) -> bool {
        !event_id.is_empty() && self.ids.contains(event_id)
    }

    /// Records an event id as handled. Idempotent; empty ids are ignored.
    pub fn mark(&mut self, event_id: &str) {
        if event_id.is_empty() {
            return;
        }
        if self.ids.insert(event_id.to_string()) {
            self.order.push_back(event_id.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns `true` once the store is due for a [`DedupStore::compact`].
    pub fn over_ceiling(&self) -> bool {
        self.order.len() > self.ceiling
    }

    /// Evicts the oldest entries, retaining the most recently marked half of
    /// the ceiling capacity.
    pub fn compact(&mut self) {
        let keep = self.ceiling / 2;
        while self.order.len() > keep {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
    }
}
