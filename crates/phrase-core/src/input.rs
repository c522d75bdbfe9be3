//! Per-sentence input: the sentence itself and the spans the decoder asks
//! phrase dictionaries to translate.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::candidates::CandidateCollection;
use crate::dict::DictionaryId;
use crate::phrase::{Phrase, WordsRange};

/// One input sentence, tokenized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    id: u64,
    phrase: Phrase,
}

impl Sentence {
    pub fn new(id: u64, phrase: Phrase) -> Self {
        Self { id, phrase }
    }

    pub fn parse(id: u64, text: &str) -> Self {
        Self::new(id, Phrase::parse(text))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.phrase.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrase.is_empty()
    }

    pub fn phrase(&self) -> &Phrase {
        &self.phrase
    }

    pub fn sub_phrase(&self, range: WordsRange) -> Phrase {
        self.phrase.sub_phrase(range)
    }

    /// All spans of at most `max_phrase_length` words, ordered by start
    /// position and then by length.
    pub fn spans(&self, max_phrase_length: usize) -> Vec<InputSpan> {
        let n = self.len();
        let mut spans = Vec::new();
        for start in 0..n {
            let last = n.min(start.saturating_add(max_phrase_length));
            for end in start + 1..=last {
                let range = WordsRange::new(start, end);
                spans.push(InputSpan::new(range, self.sub_phrase(range)));
            }
        }
        spans
    }
}

/// A contiguous source range plus one output slot per dictionary.
///
/// A slot that is present but `None` means the dictionary was asked and had
/// no candidates; an absent slot means it was never asked.
#[derive(Debug, Clone)]
pub struct InputSpan {
    range: WordsRange,
    phrase: Phrase,
    slots: BTreeMap<DictionaryId, Option<Arc<CandidateCollection>>>,
}

impl InputSpan {
    pub fn new(range: WordsRange, phrase: Phrase) -> Self {
        Self {
            range,
            phrase,
            slots: BTreeMap::new(),
        }
    }

    pub fn range(&self) -> WordsRange {
        self.range
    }

    pub fn phrase(&self) -> &Phrase {
        &self.phrase
    }

    pub fn set_candidates(
        &mut self,
        dictionary: DictionaryId,
        candidates: Option<Arc<CandidateCollection>>,
    ) {
        self.slots.insert(dictionary, candidates);
    }

    pub fn candidates(&self, dictionary: DictionaryId) -> Option<&Arc<CandidateCollection>> {
        self.slots.get(&dictionary).and_then(Option::as_ref)
    }

    pub fn take_candidates(&mut self, dictionary: DictionaryId) -> Option<Arc<CandidateCollection>> {
        self.slots.remove(&dictionary).flatten()
    }

    pub fn is_resolved(&self, dictionary: DictionaryId) -> bool {
        self.slots.contains_key(&dictionary)
    }

    /// True when a dictionary other than `dictionary` already produced at
    /// least one candidate for this span.
    pub fn has_candidates_from_other(&self, dictionary: DictionaryId) -> bool {
        self.slots
            .iter()
            .any(|(id, slot)| *id != dictionary && slot.as_ref().is_some_and(|c| !c.is_empty()))
    }

    /// Iterate filled slots in dictionary-id order.
    pub fn resolved(&self) -> impl Iterator<Item = (DictionaryId, Option<&Arc<CandidateCollection>>)> {
        self.slots.iter().map(|(id, slot)| (*id, slot.as_ref()))
    }
}
