//! Per-worker lookup state.
//!
//! A decoding worker owns one `WorkerContext` and passes it by `&mut` into
//! every dictionary call. The context holds that worker's private caches
//! (created lazily, one per dictionary) and the per-sentence lifecycle state
//! of each dictionary, so concurrent workers never touch each other's data
//! and nothing on the lookup path needs a lock. A single-threaded decoder
//! simply keeps one context for the whole process.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::{CacheStats, PhraseCache};
use crate::dict::DictionaryId;

/// Lifecycle of one dictionary as seen by one worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SentenceState {
    #[default]
    Uninitialized,
    Ready {
        sentence: u64,
    },
}

pub struct WorkerContext {
    id: usize,
    caches: HashMap<DictionaryId, PhraseCache>,
    states: HashMap<DictionaryId, SentenceState>,
}

impl WorkerContext {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            caches: HashMap::new(),
            states: HashMap::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// This worker's cache for `dictionary`, created on first use. An
    /// existing cache takes on `max_size` if the dictionary's setting changed.
    pub fn cache_mut(&mut self, dictionary: DictionaryId, max_size: usize) -> &mut PhraseCache {
        let worker = self.id;
        let cache = self.caches.entry(dictionary).or_insert_with(|| {
            debug!(worker, %dictionary, max_size, "creating worker cache");
            PhraseCache::new(max_size)
        });
        cache.set_max_size(max_size);
        cache
    }

    pub fn cache(&self, dictionary: DictionaryId) -> Option<&PhraseCache> {
        self.caches.get(&dictionary)
    }

    /// Existing cache only; used by cleanup paths that must not allocate one.
    pub(crate) fn existing_cache_mut(&mut self, dictionary: DictionaryId) -> Option<&mut PhraseCache> {
        self.caches.get_mut(&dictionary)
    }

    pub fn state(&self, dictionary: DictionaryId) -> SentenceState {
        self.states.get(&dictionary).copied().unwrap_or_default()
    }

    pub(crate) fn set_state(&mut self, dictionary: DictionaryId, state: SentenceState) {
        self.states.insert(dictionary, state);
    }

    /// `(dictionary, entries, stats)` for every cache this worker created,
    /// ordered by dictionary id.
    pub fn cache_stats(&self) -> Vec<(DictionaryId, usize, CacheStats)> {
        let mut out: Vec<_> = self
            .caches
            .iter()
            .map(|(id, cache)| (*id, cache.len(), cache.stats()))
            .collect();
        out.sort_by_key(|(id, _, _)| *id);
        out
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::candidates::{CandidateCollection, TargetPhrase};
    use crate::phrase::Phrase;

    #[test]
    fn test_cache_created_lazily() {
        let mut ctx = WorkerContext::new(0);
        let dict = DictionaryId(3);
        assert!(ctx.cache(dict).is_none());
        assert_eq!(ctx.cache_mut(dict, 16).max_size(), 16);
        assert!(ctx.cache(dict).is_some());
        // Existing cache follows the current setting.
        assert_eq!(ctx.cache_mut(dict, 99).max_size(), 99);
        assert_eq!(ctx.cache(dict).map(PhraseCache::max_size), Some(99));
    }

    #[test]
    fn test_default_state_is_uninitialized() {
        let ctx = WorkerContext::new(1);
        assert_eq!(ctx.state(DictionaryId(0)), SentenceState::Uninitialized);
    }

    #[test]
    fn test_workers_do_not_share_caches() {
        let dict = DictionaryId(0);
        let fp = Phrase::parse("haus").fingerprint();
        let coll: Arc<CandidateCollection> = Arc::new(
            std::iter::once(TargetPhrase::new(Phrase::parse("house"), vec![0.0])).collect(),
        );

        let mut w0 = WorkerContext::new(0);
        let mut w1 = WorkerContext::new(1);
        w0.cache_mut(dict, 4).put(fp, Some(Arc::clone(&coll)));
        w1.cache_mut(dict, 4).put(fp, Some(Arc::clone(&coll)));

        w0.cache_mut(dict, 4).reduce_to(0);
        assert!(!w0.cache(dict).unwrap().contains(&fp));
        assert!(w1.cache(dict).unwrap().contains(&fp));
        assert!(w1.cache_mut(dict, 4).get(&fp).is_some());
    }

    #[test]
    fn test_cache_stats_sorted() {
        let mut ctx = WorkerContext::new(0);
        ctx.cache_mut(DictionaryId(2), 4);
        ctx.cache_mut(DictionaryId(0), 4);
        let ids: Vec<DictionaryId> = ctx.cache_stats().iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec![DictionaryId(0), DictionaryId(2)]);
    }
}
