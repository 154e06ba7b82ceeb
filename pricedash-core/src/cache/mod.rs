//! Cache layer: memoizes expensive computations keyed by `CacheKey`.
//!
//! Backends implement `get_or_compute` and `invalidate`. Backend failures are
//! logged and degrade to direct computation; they never fail a request. Compute
//! errors are returned to the caller and never cached.

pub mod file;
pub mod key;
pub mod memory;

pub use file::FileCache;
pub use key::CacheKey;
pub use memory::MemoryCache;

use crate::config::{CacheBackendKind, CacheConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Backend-internal failures. Logged, never returned from `get_or_compute`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A pluggable memoization backend.
pub trait CacheBackend<V>: Send + Sync {
    /// Return the cached value for `key`, or run `compute` and store its result.
    ///
    /// Concurrent callers for the same uncached key wait for a single computation.
    fn get_or_compute<E, F>(&self, key: &CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>;

    /// Drop the entry for `key`, if any.
    fn invalidate(&self, key: &CacheKey);

    /// Drop every entry.
    fn invalidate_all(&self);

    fn name(&self) -> &str;
}

/// Pass-through backend: always computes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl<V> CacheBackend<V> for NoCache {
    fn get_or_compute<E, F>(&self, _key: &CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        compute()
    }

    fn invalidate(&self, _key: &CacheKey) {}

    fn invalidate_all(&self) {}

    fn name(&self) -> &str {
        "none"
    }
}

/// Backend chosen at runtime from configuration.
pub enum ConfiguredCache<V> {
    Memory(MemoryCache<V>),
    File(FileCache<V>),
    None(NoCache),
}

impl<V> ConfiguredCache<V> {
    pub fn from_config(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        match config.backend {
            CacheBackendKind::Memory => ConfiguredCache::Memory(MemoryCache::new(ttl)),
            CacheBackendKind::File => ConfiguredCache::File(FileCache::new(&config.dir, ttl)),
            CacheBackendKind::None => ConfiguredCache::None(NoCache),
        }
    }
}

impl<V> CacheBackend<V> for ConfiguredCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn get_or_compute<E, F>(&self, key: &CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        match self {
            ConfiguredCache::Memory(c) => c.get_or_compute(key, compute),
            ConfiguredCache::File(c) => c.get_or_compute(key, compute),
            ConfiguredCache::None(c) => c.get_or_compute(key, compute),
        }
    }

    fn invalidate(&self, key: &CacheKey) {
        match self {
            ConfiguredCache::Memory(c) => c.invalidate(key),
            ConfiguredCache::File(c) => c.invalidate(key),
            ConfiguredCache::None(c) => CacheBackend::<V>::invalidate(c, key),
        }
    }

    fn invalidate_all(&self) {
        match self {
            ConfiguredCache::Memory(c) => c.invalidate_all(),
            ConfiguredCache::File(c) => c.invalidate_all(),
            ConfiguredCache::None(c) => CacheBackend::<V>::invalidate_all(c),
        }
    }

    fn name(&self) -> &str {
        match self {
            ConfiguredCache::Memory(c) => c.name(),
            ConfiguredCache::File(c) => c.name(),
            ConfiguredCache::None(c) => CacheBackend::<V>::name(c),
        }
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
