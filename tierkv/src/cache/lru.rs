use super::recency::RecencyIndex;
use super::stats::CacheStats;
use crate::core::error::{KvError, Result};
use crate::core::item::{Item, RawItem, to_bytes, transfer};
use crate::core::store::{Completion, SharedItem, Store};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bounded LRU cache, optionally backed by another store
///
/// Without a backend, evicted entries are simply dropped. With one, misses are
/// read through the backend and promoted, and evicted entries are written back
/// to it asynchronously.
pub struct LruCache {
    state: Mutex<CacheState>,
    backend: Option<Arc<dyn Store>>,
}

struct CacheState {
    index: RecencyIndex,
    stats: CacheStats,
}

impl LruCache {
    /// Create a standalone cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Result<Self> {
        Self::build(capacity, None)
    }

    /// Create a cache in front of `backend`
    pub fn with_backend(capacity: usize, backend: Arc<dyn Store>) -> Result<Self> {
        Self::build(capacity, Some(backend))
    }

    fn build(capacity: usize, backend: Option<Arc<dyn Store>>) -> Result<Self> {
        if capacity == 0 {
            return Err(KvError::InvalidConfig(
                "cache capacity must be at least 1".to_string(),
            ));
        }

        info!(
            "Initializing LRU cache with capacity={}, backend={}",
            capacity,
            backend.is_some()
        );

        Ok(Self {
            state: Mutex::new(CacheState {
                index: RecencyIndex::new(capacity),
                stats: CacheStats::default(),
            }),
            backend,
        })
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().index.capacity()
    }

    /// Whether `key` is resident, without touching its recency
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().index.contains(key)
    }

    pub fn backend(&self) -> Option<&Arc<dyn Store>> {
        self.backend.as_ref()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats.clone()
    }

    /// Insert a non-resident key, evicting the least recently used entry when
    /// full. Returns the completion of the write-back, if one was issued;
    /// write-back failures are not reported through it.
    fn admit(
        &self,
        state: &mut MutexGuard<'_, CacheState>,
        key: &str,
        item: SharedItem,
    ) -> Option<Completion> {
        state.stats.record_insert();
        let (victim_key, victim_item) = state.index.insert(key.to_string(), item)?;
        state.stats.record_eviction();

        match &self.backend {
            Some(backend) => {
                state.stats.record_write_backs(1);
                debug!("Cache EVICT: {} -> backend", victim_key);
                Some(backend.set(&victim_key, Some(victim_item)).settle())
            }
            None => {
                debug!("Cache EVICT: {} (dropped)", victim_key);
                None
            }
        }
    }
}

impl Store for LruCache {
    fn get_into(&self, key: &str, item: &mut dyn Item) -> bool {
        let resident = {
            let mut state = self.state.lock();

            if let Some(resident) = state.index.touch(key) {
                state.stats.record_hit();
                debug!("Cache HIT for key: {}", key);
                resident
            } else {
                state.stats.record_miss();
                debug!("Cache MISS for key: {}", key);

                let Some(backend) = &self.backend else {
                    return false;
                };
                if !backend.get_into(key, item) {
                    return false;
                }

                state.stats.record_backend_hit();
                // The caller keeps its template; the cache holds a byte snapshot
                match to_bytes(&*item) {
                    Ok(bytes) => {
                        let _ = self.admit(&mut state, key, Arc::new(RawItem::new(bytes)));
                    }
                    Err(e) => warn!("Cache could not promote key {}: {}", key, e),
                }
                return true;
            }
        };

        match transfer(resident.as_ref(), item) {
            Ok(_) => true,
            Err(e) => {
                debug!("Cache entry {} does not decode into template: {}", key, e);
                false
            }
        }
    }

    fn set(&self, key: &str, item: Option<SharedItem>) -> Completion {
        let mut state = self.state.lock();

        match item {
            Some(item) if state.index.contains(key) => {
                state.index.replace(key, item);
                debug!("Cache UPDATE: {}", key);
                Completion::ok()
            }
            Some(item) => {
                debug!("Cache PUT: {}", key);
                self.admit(&mut state, key, item)
                    .unwrap_or_else(Completion::ok)
            }
            None => {
                if state.index.remove(key).is_none() {
                    return Completion::ok();
                }
                debug!("Cache DELETE: {}", key);
                // The entry may never have been written back, so a backend
                // without the key still counts as a successful delete
                match &self.backend {
                    Some(backend) => backend.set(key, None).ignore_missing(),
                    None => Completion::ok(),
                }
            }
        }
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .index
            .keys()
            .filter(|k| k.starts_with(prefix))
            .map(str::to_string)
            .collect()
    }

    fn flush(&self) -> Completion {
        let Some(backend) = &self.backend else {
            return Completion::ok();
        };

        {
            let mut state = self.state.lock();
            let mut written = 0u64;
            for (key, item) in state.index.iter() {
                let _ = backend.set(key, Some(Arc::clone(item)));
                written += 1;
            }
            state.stats.record_write_backs(written);
            debug!("Cache FLUSH: {} entries written back", written);
        }

        backend.flush()
    }
}
