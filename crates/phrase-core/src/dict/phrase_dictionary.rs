use std::path::Path;
use std::sync::{Arc, OnceLock};

use tracing::{debug, debug_span, warn};

use super::resolver::Resolver;
use super::rule_lookup::{ChartContext, LimitedRuleLookup, RuleLookupManager};
use super::{
    ConfigError, DictionaryConfig, DictionaryId, LookupError, PhraseTable, TableError, TableKind,
};
use crate::cache::CachedLookup;
use crate::candidates::CandidateCollection;
use crate::input::{InputSpan, Sentence};
use crate::phrase::{Phrase, WordsRange};
use crate::task::QueryPool;
use crate::worker::{SentenceState, WorkerContext};

/// A configured phrase table as the decoder sees it.
///
/// Lookups go through the calling worker's cache first; the storage engine
/// is only queried on a miss. Lookups are valid between
/// `initialize_for_input` and `clean_up_after_sentence` for the calling
/// worker; outside that window they fail with `LookupError::NotInitialized`.
pub struct PhraseDictionary {
    id: DictionaryId,
    config: DictionaryConfig,
    engine: Arc<dyn PhraseTable>,
    /// Spawned on the first batch that can use it; reset by `set_parameter`.
    pool: OnceLock<Option<QueryPool>>,
}

impl PhraseDictionary {
    pub fn new(id: DictionaryId, config: DictionaryConfig, engine: Arc<dyn PhraseTable>) -> Self {
        Self {
            id,
            config,
            engine,
            pool: OnceLock::new(),
        }
    }

    pub fn id(&self) -> DictionaryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> TableKind {
        self.config.kind
    }

    pub fn config(&self) -> &DictionaryConfig {
        &self.config
    }

    pub fn table_limit(&self) -> usize {
        self.config.limits.table_limit
    }

    pub fn cache_size(&self) -> usize {
        self.config.limits.cache_size
    }

    pub fn max_phrase_length(&self) -> usize {
        self.config.limits.max_phrase_length
    }

    /// Configured pool size; 0 means batches run on the calling worker.
    pub fn query_threads(&self) -> usize {
        self.config.query_threads
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.config.file_path.as_deref()
    }

    pub fn engine(&self) -> &Arc<dyn PhraseTable> {
        &self.engine
    }

    /// Apply one `key=value` setting. Core keys are handled here, anything
    /// else is offered to the storage engine; a key neither recognizes is an
    /// error.
    pub fn set_parameter(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        // Pool threads captured the old limits and hold the engine.
        self.pool = OnceLock::new();
        if self.config.set_parameter(key, value)? {
            debug!(dictionary = %self.config.name, key, value, "set parameter");
            return Ok(());
        }
        let engine =
            Arc::get_mut(&mut self.engine).ok_or_else(|| ConfigError::Frozen(key.to_string()))?;
        if engine.set_parameter(key, value)? {
            debug!(dictionary = %self.config.name, key, value, "set engine parameter");
            Ok(())
        } else {
            Err(ConfigError::UnknownParameter {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
    }

    /// Let the engine load its data with the final configuration. Engines
    /// shared with other owners were built by the caller and are left as is.
    pub fn load(&mut self) -> Result<(), TableError> {
        self.pool = OnceLock::new();
        match Arc::get_mut(&mut self.engine) {
            Some(engine) => engine.load(&self.config),
            None => {
                debug!(dictionary = %self.config.name, "engine is shared, skipping load");
                Ok(())
            }
        }
    }

    fn ensure_ready(&self, ctx: &WorkerContext) -> Result<(), LookupError> {
        match ctx.state(self.id) {
            SentenceState::Ready { .. } => Ok(()),
            SentenceState::Uninitialized => Err(LookupError::NotInitialized {
                dictionary: self.config.name.clone(),
            }),
        }
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.engine.as_ref(), self.config.limits)
    }

    fn query_pool(&self) -> Option<&QueryPool> {
        self.pool
            .get_or_init(|| {
                let threads = self.config.query_threads;
                if threads == 0 {
                    return None;
                }
                match QueryPool::spawn(
                    &self.config.name,
                    threads,
                    Arc::clone(&self.engine),
                    self.config.limits,
                ) {
                    Ok(pool) => Some(pool),
                    Err(e) => {
                        warn!(dictionary = %self.config.name, "cannot start query pool, batches run sequentially: {e}");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Threads currently serving batches for this dictionary.
    pub fn active_query_threads(&self) -> usize {
        self.pool
            .get()
            .and_then(Option::as_ref)
            .map_or(0, QueryPool::size)
    }

    /// Candidates for one source phrase, `None` if the table has none.
    pub fn lookup_single(
        &self,
        ctx: &mut WorkerContext,
        phrase: &Phrase,
    ) -> Result<CachedLookup, LookupError> {
        self.ensure_ready(ctx)?;
        let cache = ctx.cache_mut(self.id, self.config.limits.cache_size);
        Ok(self.resolver().lookup(cache, phrase))
    }

    /// Fill this dictionary's slot on every span.
    ///
    /// With a query pool the spans are resolved in parallel, one task per
    /// span, by pool threads with their own caches. Those caches live as long
    /// as the pool: they are not part of the worker's cache stats and are not
    /// trimmed by `clean_up_after_sentence`, only by their own capacity.
    /// Otherwise the worker's cache is consulted and all misses go to the
    /// engine in one batch. Both paths give the same results.
    pub fn lookup_batch(
        &self,
        ctx: &mut WorkerContext,
        spans: &mut [InputSpan],
    ) -> Result<(), LookupError> {
        self.ensure_ready(ctx)?;
        let _span = debug_span!(
            "lookup_batch",
            dictionary = %self.config.name,
            spans = spans.len()
        )
        .entered();

        let pooled = match self.query_pool() {
            Some(pool) if spans.len() > 1 => {
                pool.run(spans.iter().map(|s| s.phrase().clone()).collect())
            }
            _ => None,
        };
        let results = match pooled {
            Some(results) => results,
            None => {
                let phrases: Vec<&Phrase> = spans.iter().map(InputSpan::phrase).collect();
                let cache = ctx.cache_mut(self.id, self.config.limits.cache_size);
                self.resolver().lookup_many(cache, &phrases)
            }
        };

        for (span, result) in spans.iter_mut().zip(results) {
            span.set_candidates(self.id, result);
        }
        Ok(())
    }

    /// Candidates for `range` of `sentence`.
    pub fn lookup_range(
        &self,
        ctx: &mut WorkerContext,
        sentence: &Sentence,
        range: WordsRange,
    ) -> Result<CachedLookup, LookupError> {
        let phrase = sentence.sub_phrase(range);
        self.lookup_single(ctx, &phrase)
    }

    pub fn provides_prefix_check(&self) -> bool {
        self.engine.provides_prefix_check()
    }

    /// Whether any entry starts with `phrase`. Engines without a prefix
    /// check answer `true` so callers go on to a full lookup.
    pub fn prefix_exists(&self, ctx: &WorkerContext, phrase: &Phrase) -> Result<bool, LookupError> {
        self.ensure_ready(ctx)?;
        if !self.engine.provides_prefix_check() {
            return Ok(true);
        }
        Ok(self.engine.prefix_exists(phrase))
    }

    /// Decode-graph backoff: with `backoff == 0` every span is looked up;
    /// otherwise only spans of at most `backoff` words that no other
    /// dictionary has already translated.
    pub fn satisfy_backoff(&self, span: &InputSpan, backoff: usize) -> bool {
        if backoff == 0 {
            return true;
        }
        if span.phrase().len() > backoff {
            return false;
        }
        !span.has_candidates_from_other(self.id)
    }

    pub fn initialize_for_input(
        &self,
        ctx: &mut WorkerContext,
        sentence: &Sentence,
    ) -> Result<(), LookupError> {
        if let SentenceState::Ready { .. } = ctx.state(self.id) {
            return Err(LookupError::AlreadyInitialized {
                dictionary: self.config.name.clone(),
            });
        }
        self.engine.initialize_for_input(sentence);
        ctx.set_state(
            self.id,
            SentenceState::Ready {
                sentence: sentence.id(),
            },
        );
        debug!(
            dictionary = %self.config.name,
            worker = ctx.id(),
            sentence = sentence.id(),
            "initialized for input"
        );
        Ok(())
    }

    /// Release sentence-scoped state and trim the worker's cache.
    pub fn clean_up_after_sentence(
        &self,
        ctx: &mut WorkerContext,
        sentence: &Sentence,
    ) -> Result<(), LookupError> {
        let SentenceState::Ready { sentence: active } = ctx.state(self.id) else {
            return Err(LookupError::NotInitialized {
                dictionary: self.config.name.clone(),
            });
        };
        if active != sentence.id() {
            warn!(
                dictionary = %self.config.name,
                active,
                cleaned = sentence.id(),
                "cleanup for a different sentence than was initialized"
            );
        }
        self.engine.clean_up_after_sentence(sentence);
        if let Some(cache) = ctx.existing_cache_mut(self.id) {
            cache.reduce();
        }
        ctx.set_state(self.id, SentenceState::Uninitialized);
        Ok(())
    }

    /// A chart manager for `chart`, holding the table limit in effect now.
    pub fn create_rule_lookup_manager(
        &self,
        chart: &ChartContext<'_>,
    ) -> Result<Box<dyn RuleLookupManager>, LookupError> {
        let inner = self
            .engine
            .create_rule_lookup_manager(chart)
            .ok_or_else(|| LookupError::RuleLookupUnsupported {
                dictionary: self.config.name.clone(),
            })?;
        Ok(Box::new(LimitedRuleLookup::new(
            inner,
            self.config.limits.table_limit,
        )))
    }

    /// The caller is done with `candidates`. The collection is freed once no
    /// cache entry or other caller still holds it.
    pub fn release(&self, candidates: Arc<CandidateCollection>) {
        self.engine.release(&candidates);
    }
}
