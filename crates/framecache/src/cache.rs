//! Bounded LRU cache of encoded frames, keyed by fingerprint.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::fingerprint::Fingerprint;

pub const DEFAULT_CAPACITY: usize = 256;

/// Shared cache of encoded PNG frames.
///
/// Values are `Arc<Vec<u8>>` so a hit never copies the frame. Hit and miss
/// counters are atomics; the map itself sits behind one mutex since every
/// operation on it is short.
pub struct RenderCache {
    inner: Mutex<Inner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

struct Inner {
    frames: HashMap<Fingerprint, Arc<Vec<u8>>>,
    lru: VecDeque<Fingerprint>,
}

/// Counters reported by the server status endpoints.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

impl RenderCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                frames: HashMap::new(),
                lru: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up an encoded frame, refreshing its LRU position on a hit.
    pub fn get(&self, key: &Fingerprint) -> Option<Arc<Vec<u8>>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.frames.get(key).cloned() {
            Some(frame) => {
                inner.touch(key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(fingerprint = %key, "frame cache hit");
                Some(frame)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert an encoded frame, evicting the least recently used entries
    /// beyond capacity.
    pub fn insert(&self, key: Fingerprint, frame: Arc<Vec<u8>>) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames.insert(key.clone(), frame);
        inner.touch(&key);

        while inner.lru.len() > self.capacity {
            if let Some(old) = inner.lru.pop_front() {
                inner.frames.remove(&old);
                tracing::debug!(fingerprint = %old, "frame cache eviction");
            }
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames.clear();
        inner.lru.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            entries: inner.frames.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Inner {
    fn touch(&mut self, key: &Fingerprint) {
        if let Some(pos) = self.lru.iter().position(|k| k == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key.clone());
    }
}
