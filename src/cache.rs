//! TTL caches and the clock they read.
//!
//! All time-dependent state in the crate (response caches, endpoint failure
//! windows, wallet snapshots) goes through an injected [`Clock`] so expiry can
//! be driven deterministically in tests with [`ManualClock`].

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Source of monotonic time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { origin: Instant::now(), offset: Mutex::new(Duration::ZERO) }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + offset
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Stale entries are kept for this many TTLs before an insert prunes them
pub const DEFAULT_RETENTION_FACTOR: u32 = 60;

/// Keyed cache whose entries go stale after `ttl` but are kept around so
/// callers can fall back to them when the upstream is down.
///
/// Entries older than `retention` are dropped on the next insert, so keys
/// that are never read again do not accumulate forever.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    retention: Duration,
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_retention(ttl, ttl * DEFAULT_RETENTION_FACTOR)
    }

    pub fn with_retention(ttl: Duration, retention: Duration) -> Self {
        Self { ttl, retention: retention.max(ttl), entries: HashMap::new() }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Entry younger than the TTL
    pub fn get_fresh<Q>(&self, key: &Q, now: Instant) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Entry of any age. Last-resort fallback only.
    pub fn get_stale<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        self.prune(now);
        self.entries.insert(key, CacheEntry { value, stored_at: now });
    }

    /// Drop entries past the retention window
    pub fn prune(&mut self, now: Instant) {
        let retention = self.retention;
        self.entries.retain(|_, entry| now.saturating_duration_since(entry.stored_at) < retention);
    }

    pub fn invalidate<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
