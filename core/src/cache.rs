//! In-memory query cache keyed by [`CacheKey`].
//!
//! # Design
//! Entries hold the raw JSON of a successful query so one cache serves
//! every response type; the session deserializes on the way out. An entry
//! is fresh while it has not been invalidated and is younger than the
//! caller's stale time. Stale entries stay readable so a view can keep
//! showing old data while it refetches; `collect_garbage` drops entries
//! older than the gc window.
//!
//! Time comes from a [`Clock`] so stale-time behaviour is testable
//! without sleeping.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::keys::CacheKey;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    updated_at: Instant,
    invalidated: bool,
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<CacheKey, Entry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cached value for `key` if it is still fresh at `now`.
    pub fn lookup_fresh(&self, key: &CacheKey, stale_time: Duration, now: Instant) -> Option<&Value> {
        let entry = self.entries.get(key)?;
        if entry.invalidated || now.saturating_duration_since(entry.updated_at) >= stale_time {
            return None;
        }
        Some(&entry.value)
    }

    /// The cached value for `key`, fresh or not.
    pub fn lookup(&self, key: &CacheKey) -> Option<&Value> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn is_stale(&self, key: &CacheKey, stale_time: Duration, now: Instant) -> bool {
        self.lookup_fresh(key, stale_time, now).is_none()
    }

    /// Stores a freshly fetched value, clearing any invalidation mark.
    pub fn store(&mut self, key: CacheKey, value: Value, now: Instant) {
        self.entries.insert(
            key,
            Entry {
                value,
                updated_at: now,
                invalidated: false,
            },
        );
    }

    /// Marks every entry under `prefix` stale. Returns how many matched.
    pub fn invalidate(&mut self, prefix: &CacheKey) -> usize {
        let mut count = 0;
        for (key, entry) in self.entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                count += 1;
            }
        }
        count
    }

    /// Drops every entry under `prefix`. Returns how many were removed.
    pub fn remove(&mut self, prefix: &CacheKey) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    /// Evicts entries not refreshed within `gc_time`.
    pub fn collect_garbage(&mut self, gc_time: Duration, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.updated_at) < gc_time);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
