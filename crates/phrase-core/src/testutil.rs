use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::candidates::CandidateCollection;
use crate::dict::{DictionaryConfig, MemoryPhraseTable, PhraseTable, TableError};
use crate::phrase::Phrase;

pub(crate) const SAMPLE_TABLE: &str = "\
das ||| the ||| 0.7
das ||| that ||| 0.2
das haus ||| the house ||| 0.8
haus ||| house ||| 0.9
haus ||| home ||| 0.4
ist ||| is ||| 0.95
klein ||| small ||| 0.6
klein ||| little ||| 0.3
";

pub(crate) fn sample_table() -> MemoryPhraseTable {
    MemoryPhraseTable::parse(SAMPLE_TABLE, None).unwrap()
}

/// `haus ||| t0 ... t{n-1}`, scores descending.
pub(crate) fn wide_table(n: usize) -> MemoryPhraseTable {
    let text: String = (0..n)
        .map(|i| format!("haus ||| t{i} ||| {}\n", 1.0 - i as f32 / 100.0))
        .collect();
    MemoryPhraseTable::parse(&text, None).unwrap()
}

/// Wraps a table and counts how often the engine is actually queried.
pub(crate) struct CountingTable {
    inner: MemoryPhraseTable,
    lookups: Arc<AtomicUsize>,
    batches: Arc<AtomicUsize>,
    node_ids: bool,
}

impl CountingTable {
    pub(crate) fn new(inner: MemoryPhraseTable) -> Self {
        Self {
            inner,
            lookups: Arc::new(AtomicUsize::new(0)),
            batches: Arc::new(AtomicUsize::new(0)),
            node_ids: false,
        }
    }

    /// Report a node id (the phrase length) instead of hashing content.
    pub(crate) fn with_node_ids(mut self) -> Self {
        self.node_ids = true;
        self
    }

    /// Handles that stay valid after the table is moved into a dictionary.
    pub(crate) fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (Arc::clone(&self.lookups), Arc::clone(&self.batches))
    }
}

pub(crate) fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

impl PhraseTable for CountingTable {
    fn raw_lookup(&self, source: &Phrase) -> Option<CandidateCollection> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.raw_lookup(source)
    }

    fn raw_lookup_batch(&self, sources: &[&Phrase]) -> Vec<Option<CandidateCollection>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.lookups.fetch_add(sources.len(), Ordering::SeqCst);
        sources.iter().map(|s| self.inner.raw_lookup(s)).collect()
    }

    fn node_id(&self, source: &Phrase) -> Option<u64> {
        self.node_ids.then_some(source.len() as u64)
    }

    fn load(&mut self, config: &DictionaryConfig) -> Result<(), TableError> {
        self.inner.load(config)
    }
}
