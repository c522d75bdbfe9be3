//! Target-side translation candidates produced by one phrase lookup.

use std::slice;

use serde::{Deserialize, Serialize};

use crate::phrase::Phrase;

/// One translation option with its pre-computed feature scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPhrase {
    pub phrase: Phrase,
    pub scores: Vec<f32>,
    /// Sum of `scores`; used by engines that re-rank merged candidates.
    pub future_score: f32,
}

impl TargetPhrase {
    pub fn new(phrase: Phrase, scores: Vec<f32>) -> Self {
        let future_score = scores.iter().sum();
        Self {
            phrase,
            scores,
            future_score,
        }
    }
}

/// Ranked candidates for one source phrase.
///
/// Order is the storage engine's ranking. Once wrapped in an `Arc` and handed
/// to a cache, a collection is never mutated again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateCollection {
    targets: Vec<TargetPhrase>,
}

impl CandidateCollection {
    pub fn new(targets: Vec<TargetPhrase>) -> Self {
        Self { targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, TargetPhrase> {
        self.targets.iter()
    }

    pub fn as_slice(&self) -> &[TargetPhrase] {
        &self.targets
    }

    pub fn best(&self) -> Option<&TargetPhrase> {
        self.targets.first()
    }

    pub fn push(&mut self, target: TargetPhrase) {
        self.targets.push(target);
    }

    /// Keep the first `table_limit` candidates; `0` means unlimited.
    pub fn truncate_to_limit(&mut self, table_limit: usize) {
        if table_limit > 0 {
            self.targets.truncate(table_limit);
        }
    }

    pub fn into_targets(self) -> Vec<TargetPhrase> {
        self.targets
    }
}

impl FromIterator<TargetPhrase> for CandidateCollection {
    fn from_iter<I: IntoIterator<Item = TargetPhrase>>(iter: I) -> Self {
        Self {
            targets: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CandidateCollection {
    type Item = &'a TargetPhrase;
    type IntoIter = slice::Iter<'a, TargetPhrase>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(n: usize) -> CandidateCollection {
        (0..n)
            .map(|i| TargetPhrase::new(Phrase::parse(&format!("t{i}")), vec![-(i as f32)]))
            .collect()
    }

    #[test]
    fn test_future_score_is_sum() {
        let t = TargetPhrase::new(Phrase::parse("house"), vec![-1.0, -0.5, 2.0]);
        assert!((t.future_score - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_truncate_keeps_engine_order() {
        let mut c = collection(20);
        c.truncate_to_limit(5);
        assert_eq!(c.len(), 5);
        let surfaces: Vec<String> = c.iter().map(|t| t.phrase.to_string()).collect();
        assert_eq!(surfaces, vec!["t0", "t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn test_truncate_zero_is_unlimited() {
        let mut c = collection(20);
        c.truncate_to_limit(0);
        assert_eq!(c.len(), 20);
    }

    #[test]
    fn test_truncate_above_len_is_noop() {
        let mut c = collection(3);
        c.truncate_to_limit(10);
        assert_eq!(c.len(), 3);
        assert_eq!(c.best().unwrap().phrase.to_string(), "t0");
    }
}
