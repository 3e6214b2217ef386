// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::Signal;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub session_id: String,
    pub path: String,
}

impl CacheKey {
    pub fn new(session_id: &str, path: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            path: path.to_string(),
        }
    }
}

/// Number and estimated heap size of cached signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheUsage {
    pub signals: usize,
    pub bytes: usize,
}

/// Bounded least-recently-used cache of loaded signals, shared by all sessions of a registry.
/// The lock is only held for the map operation itself, never while a signal is loaded.
pub struct SignalCache {
    entries: Mutex<LruCache<CacheKey, Arc<Signal>>>,
}

impl SignalCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Looks up a signal and marks it as most recently used.
    pub fn get(&self, session_id: &str, path: &str) -> Option<Arc<Signal>> {
        self.entries
            .lock()
            .get(&CacheKey::new(session_id, path))
            .cloned()
    }

    /// Inserts or refreshes an entry, evicting the least recently used one when full.
    pub fn put(&self, session_id: &str, path: &str, signal: Arc<Signal>) {
        let key = CacheKey::new(session_id, path);
        let evicted = self.entries.lock().push(key.clone(), signal);
        if let Some((old, _)) = evicted {
            if old != key {
                tracing::debug!(
                    session_id = %old.session_id,
                    path = %old.path,
                    "evicted signal from cache"
                );
            }
        }
    }

    /// Does not change the recency of the entry.
    pub fn contains(&self, session_id: &str, path: &str) -> bool {
        self.entries
            .lock()
            .contains(&CacheKey::new(session_id, path))
    }

    /// Removes all entries of a session and returns how many there were.
    pub fn evict_session(&self, session_id: &str) -> usize {
        let mut entries = self.entries.lock();
        let keys: Vec<CacheKey> = entries
            .iter()
            .filter(|(k, _)| k.session_id == session_id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in keys.iter() {
            entries.pop(key);
        }
        keys.len()
    }

    /// Cached paths of a session, most recently used first.
    pub fn paths_for_session(&self, session_id: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(k, _)| k.session_id == session_id)
            .map(|(k, _)| k.path.clone())
            .collect()
    }

    /// Usage of one session, or of the whole cache for `None`.
    pub fn usage(&self, session_id: Option<&str>) -> CacheUsage {
        self.entries
            .lock()
            .iter()
            .filter(|(k, _)| session_id.map_or(true, |id| k.session_id == id))
            .fold(CacheUsage::default(), |usage, (_, signal)| CacheUsage {
                signals: usage.signals + 1,
                bytes: usage.bytes + signal.size_in_memory(),
            })
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

impl Default for SignalCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
