//! TTL-bounded response cache.
//!
//! Keyed by content fingerprint. Entries expire after a fixed TTL and the
//! table is capacity-bounded: overflowing inserts evict the single
//! earliest-inserted entry, regardless of how recently it was read. That is
//! deliberately NOT true LRU — insertion-order eviction is part of the
//! observable contract.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::fingerprint::Fingerprint;
use crate::types::GenerationResult;

struct CacheEntry {
    value: GenerationResult,
    inserted_at: Instant,
}

struct CacheInner {
    entries: HashMap<Fingerprint, CacheEntry>,
    insertion_order: VecDeque<Fingerprint>,
}

pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
            capacity: config.capacity,
            ttl: Duration::from_secs(config.ttl_secs),
            clock,
        }
    }

    /// Look up a fresh entry. An expired entry found here is evicted on the
    /// spot and reported as a miss.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<GenerationResult> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(fingerprint) {
            Some(entry) => now.duration_since(entry.inserted_at) >= self.ttl,
            None => return None,
        };

        if expired {
            inner.entries.remove(fingerprint);
            inner.insertion_order.retain(|fp| fp != fingerprint);
            tracing::debug!(fingerprint = %fingerprint, "evicted expired cache entry");
            return None;
        }

        inner.entries.get(fingerprint).map(|e| e.value.clone())
    }

    /// Insert a result. Overflow evicts the earliest-inserted entry.
    pub fn set(&self, fingerprint: Fingerprint, value: GenerationResult) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.entries.contains_key(&fingerprint) {
            inner.insertion_order.retain(|fp| fp != &fingerprint);
        }
        inner.insertion_order.push_back(fingerprint.clone());
        inner.entries.insert(
            fingerprint,
            CacheEntry {
                value,
                inserted_at: now,
            },
        );

        while inner.entries.len() > self.capacity {
            match inner.insertion_order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                    tracing::debug!(fingerprint = %oldest, "evicted oldest cache entry");
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
