use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{LookupLimits, PhraseTable};
use crate::cache::{CachedLookup, PhraseCache};
use crate::candidates::CandidateCollection;
use crate::phrase::{Fingerprint, Phrase};

/// The cache-then-table lookup routine shared by the sequential path and by
/// query-pool threads, so both produce the same results.
pub(crate) struct Resolver<'a> {
    engine: &'a dyn PhraseTable,
    limits: LookupLimits,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(engine: &'a dyn PhraseTable, limits: LookupLimits) -> Self {
        Self { engine, limits }
    }

    fn is_queryable(&self, phrase: &Phrase) -> bool {
        !phrase.is_empty() && phrase.len() <= self.limits.max_phrase_length
    }

    fn fingerprint(&self, phrase: &Phrase) -> Fingerprint {
        self.engine
            .node_id(phrase)
            .map(Fingerprint::Node)
            .unwrap_or_else(|| Fingerprint::of(phrase))
    }

    /// Truncate to the table limit and publish. Empty results become `None`.
    fn publish(&self, raw: Option<CandidateCollection>) -> CachedLookup {
        let mut coll = raw.filter(|c| !c.is_empty())?;
        coll.truncate_to_limit(self.limits.table_limit);
        Some(Arc::new(coll))
    }

    pub(crate) fn lookup(&self, cache: &mut PhraseCache, phrase: &Phrase) -> CachedLookup {
        if !self.is_queryable(phrase) {
            return None;
        }
        if !cache.is_enabled() {
            return self.publish(self.engine.raw_lookup(phrase));
        }
        let fingerprint = self.fingerprint(phrase);
        if let Some(hit) = cache.get(&fingerprint) {
            return hit;
        }
        let result = self.publish(self.engine.raw_lookup(phrase));
        cache.put(fingerprint, result.clone());
        result
    }

    /// Resolve many phrases: cache hits first, then every remaining phrase in
    /// one `raw_lookup_batch` call. Repeated phrases are queried once when
    /// caching is on.
    pub(crate) fn lookup_many(&self, cache: &mut PhraseCache, phrases: &[&Phrase]) -> Vec<CachedLookup> {
        let mut results: Vec<CachedLookup> = vec![None; phrases.len()];
        // Each pending query and the result slots waiting on it.
        let mut pending: Vec<(&Phrase, Option<Fingerprint>, Vec<usize>)> = Vec::new();
        let mut pending_by_fp: HashMap<Fingerprint, usize> = HashMap::new();

        for (slot, phrase) in phrases.iter().copied().enumerate() {
            if !self.is_queryable(phrase) {
                continue;
            }
            if !cache.is_enabled() {
                pending.push((phrase, None, vec![slot]));
                continue;
            }
            let fingerprint = self.fingerprint(phrase);
            if let Some(&idx) = pending_by_fp.get(&fingerprint) {
                pending[idx].2.push(slot);
                continue;
            }
            match cache.get(&fingerprint) {
                Some(hit) => results[slot] = hit,
                None => {
                    pending_by_fp.insert(fingerprint, pending.len());
                    pending.push((phrase, Some(fingerprint), vec![slot]));
                }
            }
        }

        if pending.is_empty() {
            return results;
        }

        let queries: Vec<&Phrase> = pending.iter().map(|(p, _, _)| *p).collect();
        let raw = self.engine.raw_lookup_batch(&queries);
        debug_assert_eq!(raw.len(), queries.len(), "raw_lookup_batch length mismatch");
        debug!(
            requested = phrases.len(),
            queried = queries.len(),
            "batched table lookup"
        );

        let mut raw = raw.into_iter();
        for (_, fingerprint, slots) in pending {
            let result = self.publish(raw.next().flatten());
            if let Some(fp) = fingerprint {
                cache.put(fp, result.clone());
            }
            for slot in slots {
                results[slot] = result.clone();
            }
        }
        results
    }
}
