//! LRU cache of computed [`Block`]s, keyed by the complex (or subsequence)
//! they were filled for, so repeated requests against the same structure
//! reuse work instead of refilling the DP table.
//!
//! Entries may be pinned (kept alive past their LRU turn) while a consumer
//! still holds a reference into them, e.g. mid-backtrack.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use crate::block::Block;

/// A cached, optionally pinned block plus its recency-queue slot.
struct Entry {
    block: Block<f64>,
    pins: usize,
}

/// Bounded LRU cache of filled blocks.
pub struct BlockCache {
    capacity: usize,
    entries: FxHashMap<u64, Entry>,
    order: VecDeque<u64>,
}

impl BlockCache {
    /// Build a cache that evicts down to `capacity` unpinned entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: FxHashMap::default(),
            order: VecDeque::new(),
        }
    }

    /// Look up a cached block by key, bumping its recency on hit.
    pub fn get(&mut self, key: u64) -> Option<&Block<f64>> {
        if self.entries.contains_key(&key) {
            self.touch(key);
            self.entries.get(&key).map(|e| &e.block)
        } else {
            None
        }
    }

    /// Insert or replace a block, evicting unpinned entries if over capacity.
    pub fn insert(&mut self, key: u64, block: Block<f64>) {
        self.entries.insert(key, Entry { block, pins: 0 });
        self.touch(key);
        self.evict_if_needed();
    }

    /// Pin an entry so it survives eviction until unpinned.
    pub fn pin(&mut self, key: u64) {
        if let Some(e) = self.entries.get_mut(&key) {
            e.pins += 1;
        }
    }

    /// Release one pin previously taken with [`Self::pin`].
    pub fn unpin(&mut self, key: u64) {
        if let Some(e) = self.entries.get_mut(&key) {
            e.pins = e.pins.saturating_sub(1);
        }
        self.evict_if_needed();
    }

    /// Number of entries currently held (pinned or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: u64) {
        self.order.retain(|&k| k != key);
        self.order.push_back(key);
    }

    fn evict_if_needed(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(victim) = self
                .order
                .iter()
                .position(|&k| self.entries.get(&k).is_some_and(|e| e.pins == 0))
            else {
                break;
            };
            let key = self.order.remove(victim).unwrap();
            self.entries.remove(&key);
        }
    }
}
