//! JSON file cache.
//!
//! Layout: `{dir}/{key}.json`, one file per key, each carrying the time it was
//! written. Writes are atomic (write to `.tmp`, rename into place). Any I/O or
//! decode failure is logged and treated as a miss.

use super::{lock, CacheBackend, CacheError, CacheKey};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct StoredEntry<V> {
    cached_at: DateTime<Utc>,
    value: V,
}

pub struct FileCache<V> {
    dir: PathBuf,
    ttl: Duration,
    /// Per-key locks giving single-flight within this process.
    locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    _value: PhantomData<fn() -> V>,
}

impl<V> FileCache<V> {
    /// The directory is created on first write.
    pub fn new(dir: impl AsRef<Path>, ttl: Duration) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            ttl,
            locks: Mutex::new(HashMap::new()),
            _value: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut locks = lock(&self.locks);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Forget the lock for `key` once no other caller holds or waits on it.
    fn release_key_lock(&self, key: &CacheKey, key_lock: Arc<Mutex<()>>) {
        let mut locks = lock(&self.locks);
        // One reference in the map, one here.
        if Arc::strong_count(&key_lock) == 2 {
            locks.remove(key);
        }
    }

    fn is_fresh(&self, cached_at: DateTime<Utc>) -> bool {
        match (Utc::now() - cached_at).to_std() {
            Ok(age) => age < self.ttl,
            // Written "in the future" (clock skew): treat as fresh.
            Err(_) => true,
        }
    }
}

impl<V: Serialize + DeserializeOwned> FileCache<V> {
    fn read(&self, key: &CacheKey) -> Result<Option<StoredEntry<V>>, CacheError> {
        let path = self.entry_path(key);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn write(&self, key: &CacheKey, value: &V) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let entry = StoredEntry {
            cached_at: Utc::now(),
            value,
        };
        let json = serde_json::to_string(&entry)?;
        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl<V: Serialize + DeserializeOwned> FileCache<V> {
    fn read_or_compute<E, F>(&self, key: &CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        match self.read(key) {
            Ok(Some(entry)) if self.is_fresh(entry.cached_at) => {
                debug!(%key, "file cache hit");
                return Ok(entry.value);
            }
            Ok(Some(_)) => debug!(%key, "file cache entry expired"),
            Ok(None) => debug!(%key, "file cache miss"),
            Err(e) => warn!(%key, error = %e, "file cache read failed, recomputing"),
        }

        let value = compute()?;
        if let Err(e) = self.write(key, &value) {
            warn!(%key, error = %e, "file cache write failed");
        }
        Ok(value)
    }
}

impl<V> CacheBackend<V> for FileCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    fn get_or_compute<E, F>(&self, key: &CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let key_lock = self.key_lock(key);
        let result = {
            let _guard = lock(&key_lock);
            self.read_or_compute(key, compute)
        };
        self.release_key_lock(key, key_lock);
        result
    }

    fn invalidate(&self, key: &CacheKey) {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => debug!(%key, "file cache entry invalidated"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(%key, error = %e, "failed to remove cache entry"),
        }
    }

    fn invalidate_all(&self) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove cache entry");
                }
            }
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
