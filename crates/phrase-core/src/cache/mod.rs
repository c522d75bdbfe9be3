//! Fingerprint-keyed lookup cache with recency-based capacity control.
//!
//! Every entry carries the tick of its last access, taken from a counter
//! private to the cache. When the store grows past `max_size` the oldest
//! entries are dropped until it fits again. A `max_size` of zero turns the
//! cache into a pass-through.


use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::candidates::CandidateCollection;
use crate::phrase::Fingerprint;

/// Result of one lookup as stored in the cache: `None` records a miss in the
/// phrase table so it is not queried again.
pub type CachedLookup = Option<Arc<CandidateCollection>>;

struct CacheEntry {
    candidates: CachedLookup,
    last_used: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct PhraseCache {
    entries: HashMap<Fingerprint, CacheEntry>,
    max_size: usize,
    clock: u64,
    stats: CacheStats,
}

impl PhraseCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_size,
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_size > 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up a fingerprint. `Some(_)` is a hit (which may itself record
    /// "no candidates"); `None` means the caller must query the table.
    pub fn get(&mut self, fingerprint: &Fingerprint) -> Option<CachedLookup> {
        let now = self.tick();
        match self.entries.get_mut(fingerprint) {
            Some(entry) => {
                entry.last_used = now;
                self.stats.hits += 1;
                Some(entry.candidates.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store a lookup result, then trim the store if it went over capacity.
    /// Does nothing when caching is disabled.
    pub fn put(&mut self, fingerprint: Fingerprint, candidates: CachedLookup) {
        if !self.is_enabled() {
            return;
        }
        let now = self.tick();
        self.entries.insert(
            fingerprint,
            CacheEntry {
                candidates,
                last_used: now,
            },
        );
        if self.entries.len() > self.max_size {
            self.reduce();
        }
    }

    /// Change the capacity, evicting at once if the store no longer fits.
    pub fn set_max_size(&mut self, max_size: usize) {
        if max_size == self.max_size {
            return;
        }
        debug!(from = self.max_size, to = max_size, "resizing phrase cache");
        self.max_size = max_size;
        self.reduce();
    }

    /// Trim to `max_size`. Returns the number of evicted entries.
    pub fn reduce(&mut self) -> usize {
        self.reduce_to(self.max_size)
    }

    /// Drop the least recently touched entries until at most `target` remain.
    ///
    /// The cutoff is the `len - target`-th oldest tick; ticks are unique, so
    /// exactly the surplus is removed. Collections still referenced elsewhere
    /// survive their eviction.
    pub fn reduce_to(&mut self, target: usize) -> usize {
        let len = self.entries.len();
        if len <= target {
            return 0;
        }
        let surplus = len - target;
        let removed = if target == 0 {
            self.entries.clear();
            len
        } else {
            let mut ticks: Vec<u64> = self.entries.values().map(|e| e.last_used).collect();
            let (_, cutoff, _) = ticks.select_nth_unstable(surplus);
            let cutoff = *cutoff;
            self.entries.retain(|_, e| e.last_used >= cutoff);
            len - self.entries.len()
        };
        self.stats.evictions += removed as u64;
        debug!(
            removed,
            surplus,
            remaining = self.entries.len(),
            max_size = self.max_size,
            "reduced phrase cache"
        );
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
