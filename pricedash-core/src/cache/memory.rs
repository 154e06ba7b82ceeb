//! In-process TTL cache with per-key single-flight.
//!
//! The outer map lock is held only long enough to find or create a key's slot.
//! The slot lock is held across the computation, so a second caller for the same
//! key blocks until the first finishes and then reads the fresh value, while
//! other keys proceed independently.

use super::{lock, CacheBackend, CacheKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};
use tracing::debug;

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

struct Slot<V> {
    entry: Mutex<Option<Entry<V>>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            entry: Mutex::new(None),
        }
    }
}

pub struct MemoryCache<V> {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Arc<Slot<V>>>>,
}

impl<V> MemoryCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slot(&self, key: &CacheKey) -> Arc<Slot<V>> {
        let mut slots = lock(&self.slots);
        Arc::clone(slots.entry(key.clone()).or_default())
    }
}

impl<V> MemoryCache<V> {
    /// Number of keys currently held, fresh or not.
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop slots whose entry is absent or expired and that no caller holds.
    fn sweep_expired(&self) {
        let ttl = self.ttl;
        let mut slots = lock(&self.slots);
        let before = slots.len();
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.entry.try_lock() {
                Ok(entry) => is_fresh(&entry, ttl),
                Err(TryLockError::Poisoned(poisoned)) => is_fresh(&poisoned.into_inner(), ttl),
                Err(TryLockError::WouldBlock) => true,
            }
        });
        let removed = before - slots.len();
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
    }
}

fn is_fresh<V>(entry: &Option<Entry<V>>, ttl: Duration) -> bool {
    entry.as_ref().is_some_and(|e| e.stored_at.elapsed() < ttl)
}

impl<V: Clone + Send + Sync> CacheBackend<V> for MemoryCache<V> {
    fn get_or_compute<E, F>(&self, key: &CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(key);
        let result = {
            let mut entry = lock(&slot.entry);
            match entry.as_ref() {
                Some(cached) if cached.stored_at.elapsed() < self.ttl => {
                    debug!(%key, "cache hit");
                    return Ok(cached.value.clone());
                }
                Some(_) => debug!(%key, "cache entry expired"),
                None => debug!(%key, "cache miss"),
            }

            let result = compute();
            if let Ok(value) = &result {
                *entry = Some(Entry {
                    value: value.clone(),
                    stored_at: Instant::now(),
                });
            }
            result
        };
        drop(slot);
        self.sweep_expired();
        result
    }

    fn invalidate(&self, key: &CacheKey) {
        if lock(&self.slots).remove(key).is_some() {
            debug!(%key, "cache entry invalidated");
        }
    }

    fn invalidate_all(&self) {
        lock(&self.slots).clear();
    }

    fn name(&self) -> &str {
        "memory"
    }
}
