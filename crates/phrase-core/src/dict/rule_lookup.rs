//! Hook for hierarchical (chart) decoding.
//!
//! Chart decoders ask each dictionary for a sentence-scoped manager and then
//! query it per chart cell. Grammar handling lives with the chart parser;
//! this module only defines the seam and a flat manager for engines whose
//! rules have no non-terminals.

use std::sync::Arc;

use crate::candidates::CandidateCollection;
use crate::input::Sentence;
use crate::phrase::{Phrase, WordsRange};

/// What a rule-lookup manager needs to know about the chart it serves.
pub struct ChartContext<'a> {
    pub sentence: &'a Sentence,
    /// Widest cell the parser will ask about.
    pub max_chart_span: usize,
}

pub trait RuleLookupManager: Send {
    /// Rules applicable to the cell covering `range`, best first.
    fn rules_for(&mut self, range: WordsRange) -> Vec<Arc<CandidateCollection>>;
}

/// Serves each chart cell with the contiguous phrase it covers.
pub struct FlatRuleLookup<F>
where
    F: FnMut(&Phrase) -> Option<Arc<CandidateCollection>> + Send,
{
    sentence: Sentence,
    max_chart_span: usize,
    lookup: F,
}

impl<F> FlatRuleLookup<F>
where
    F: FnMut(&Phrase) -> Option<Arc<CandidateCollection>> + Send,
{
    pub fn new(chart: &ChartContext<'_>, lookup: F) -> Self {
        Self {
            sentence: chart.sentence.clone(),
            max_chart_span: chart.max_chart_span,
            lookup,
        }
    }
}

impl<F> RuleLookupManager for FlatRuleLookup<F>
where
    F: FnMut(&Phrase) -> Option<Arc<CandidateCollection>> + Send,
{
    fn rules_for(&mut self, range: WordsRange) -> Vec<Arc<CandidateCollection>> {
        if range.is_empty() || range.len() > self.max_chart_span || range.end > self.sentence.len() {
            return Vec::new();
        }
        let phrase = self.sentence.sub_phrase(range);
        (self.lookup)(&phrase).into_iter().collect()
    }
}

/// Applies a dictionary's table limit to whatever its engine's manager
/// returns. A limit of 0 keeps every candidate.
pub(crate) struct LimitedRuleLookup {
    inner: Box<dyn RuleLookupManager>,
    table_limit: usize,
}

impl LimitedRuleLookup {
    pub(crate) fn new(inner: Box<dyn RuleLookupManager>, table_limit: usize) -> Self {
        Self { inner, table_limit }
    }
}

impl RuleLookupManager for LimitedRuleLookup {
    fn rules_for(&mut self, range: WordsRange) -> Vec<Arc<CandidateCollection>> {
        let limit = self.table_limit;
        self.inner
            .rules_for(range)
            .into_iter()
            .map(|coll| {
                if limit == 0 || coll.len() <= limit {
                    return coll;
                }
                let mut truncated = CandidateCollection::clone(&coll);
                truncated.truncate_to_limit(limit);
                Arc::new(truncated)
            })
            .collect()
    }
}
