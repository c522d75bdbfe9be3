use std::sync::Arc;

use crate::dict::{DictionaryConfig, DictionaryId, PhraseDictionary, PhraseTable, TableKind};
use crate::input::Sentence;
use crate::worker::WorkerContext;


/// A loaded dictionary with `params` applied, as the registry would build it.
fn dictionary(engine: impl PhraseTable + 'static, params: &[(&str, &str)]) -> PhraseDictionary {
    let config = DictionaryConfig::new("TM0", TableKind::Memory);
    let mut dict = PhraseDictionary::new(DictionaryId(0), config, Arc::new(engine));
    for (key, value) in params {
        dict.set_parameter(key, value).unwrap();
    }
    dict.load().unwrap();
    dict
}

/// A worker already initialized for `sentence` on `dict`.
fn ready_worker(dict: &PhraseDictionary, sentence: &Sentence) -> WorkerContext {
    let mut ctx = WorkerContext::new(0);
    dict.initialize_for_input(&mut ctx, sentence).unwrap();
    ctx
}

fn best(result: &crate::cache::CachedLookup) -> Option<String> {
    result
        .as_ref()
        .and_then(|c| c.best())
        .map(|t| t.phrase.to_string())
}
