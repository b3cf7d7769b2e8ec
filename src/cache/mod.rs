//! Bounded LRU cache of decoded layout sets.
//!
//! Entries are keyed by the blake3 hash of the literal source text, so two
//! byte-identical inputs share one entry regardless of where they came from.
//! Recency is a monotonically increasing tick stamped on every access; the
//! entry with the smallest tick goes first when the cache is full.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::LayoutSet;

pub type ContentHash = blake3::Hash;

pub fn content_hash(source: &str) -> ContentHash {
    blake3::hash(source.as_bytes())
}

struct CacheEntry {
    value: LayoutSet,
    last_used: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct LayoutCache {
    capacity: usize,
    entries: HashMap<ContentHash, CacheEntry>,
    tick: u64,
    stats: CacheStats,
}

impl LayoutCache {
    /// A capacity of zero disables caching; every lookup misses.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(&content_hash(source))
    }

    pub fn get(&mut self, source: &str) -> Option<LayoutSet> {
        let hash = content_hash(source);
        self.tick += 1;
        match self.entries.get_mut(&hash) {
            Some(entry) => {
                entry.last_used = self.tick;
                self.stats.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, source: &str, value: LayoutSet) {
        if self.capacity == 0 {
            return;
        }
        let hash = content_hash(source);
        if !self.entries.contains_key(&hash) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.tick += 1;
        self.entries.insert(
            hash,
            CacheEntry {
                value,
                last_used: self.tick,
            },
        );
    }

    /// Return the cached value for `source`, or run `decode` and cache its
    /// result. Failures are returned as-is and never cached.
    pub fn get_or_try_insert_with<F>(&mut self, source: &str, decode: F) -> Result<(LayoutSet, bool)>
    where
        F: FnOnce(&str) -> Result<LayoutSet>,
    {
        if let Some(hit) = self.get(source) {
            return Ok((hit, true));
        }
        let value = decode(source)?;
        self.insert(source, value.clone());
        Ok((value, false))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.tick = 0;
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(hash, _)| *hash);

        if let Some(hash) = oldest {
            self.entries.remove(&hash);
            self.stats.evictions += 1;
        }
    }
}

impl std::fmt::Debug for LayoutCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutCache")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}
