//! Bounded record of recently processed inbound event ids
//!
//! Relays may hand the same encrypted event to the gateway more than once.
//! The cache remembers the last [`MAX_STORED_EVENTS`] ids in insertion order
//! and evicts the oldest-inserted id first.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Capacity bound of the dedup cache
pub const MAX_STORED_EVENTS: usize = 1000;

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order, oldest at the front
    order: VecDeque<String>,
    ids: HashSet<String>,
}

/// Insertion-ordered, capacity-bounded set of event ids
#[derive(Debug)]
pub struct EventDedupCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for EventDedupCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDedupCache {
    pub fn new() -> Self {
        Self::with_capacity(MAX_STORED_EVENTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn seen(&self, event_id: &str) -> bool {
        self.inner.lock().ids.contains(event_id)
    }

    /// Record `event_id`, evicting the oldest-inserted ids beyond capacity
    pub fn mark_seen(&self, event_id: &str) {
        let mut inner = self.inner.lock();
        Self::insert_locked(&mut inner, self.capacity, event_id);
    }

    /// Atomically check and record; returns `true` if the id was new
    pub fn check_and_mark(&self, event_id: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.ids.contains(event_id) {
            return false;
        }
        Self::insert_locked(&mut inner, self.capacity, event_id);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_locked(inner: &mut Inner, capacity: usize, event_id: &str) {
        // Re-marking keeps the original position
        if !inner.ids.insert(event_id.to_string()) {
            return;
        }
        inner.order.push_back(event_id.to_string());

        let mut evicted = 0usize;
        while inner.order.len() > capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.ids.remove(&oldest);
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, "Evicted old event ids from dedup cache");
        }
    }
}
