//! Compiled Fragment Cache
//!
//! Memoizes resolved column names, projection lists and sort lists.
//! Entries are pure functions of their key, so concurrent writers may
//! overwrite each other freely; a cleared entry is recomputed on next use.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of ticks between full clears.
pub const DEFAULT_CLEAR_EVERY: u64 = 10;

/// Kind of compiled fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    /// Column reference used in a predicate
    Column,
    /// SELECT projection list
    Fields,
    /// ORDER BY list
    Sort,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: FragmentKind,
    language: String,
    raw: String,
}

/// Thread-safe fragment cache.
#[derive(Debug)]
pub struct FragmentCache {
    entries: DashMap<CacheKey, String>,
    clear_every: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for FragmentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CLEAR_EVERY)
    }
}

impl FragmentCache {
    /// `clear_every` is the tick period of full clears; 0 disables tick clearing.
    pub fn new(clear_every: u64) -> Self {
        Self {
            entries: DashMap::new(),
            clear_every,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached fragment or compute and store it.
    ///
    /// The computation runs without holding a shard lock.
    pub fn get_or_compute(
        &self,
        kind: FragmentKind,
        language: &str,
        raw: &str,
        compute: impl FnOnce() -> String,
    ) -> String {
        let key = CacheKey {
            kind,
            language: language.to_string(),
            raw: raw.to_string(),
        };

        if let Some(entry) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry.value().clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute();
        self.entries.insert(key, value.clone());
        value
    }

    /// Periodic signal; clears everything on every `clear_every`-th tick.
    pub fn on_tick(&self, counter: u64) {
        if self.clear_every > 0 && counter % self.clear_every == 0 {
            self.invalidate();
        }
    }

    /// Drop all entries.
    pub fn invalidate(&self) {
        let count = self.entries.len();
        self.entries.clear();
        tracing::debug!("Cleared {} compiled fragments", count);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}
