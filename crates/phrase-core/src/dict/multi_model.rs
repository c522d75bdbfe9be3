use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::config::{invalid, parse_f32_list};
use super::{ConfigError, PhraseTable};
use crate::candidates::{CandidateCollection, TargetPhrase};
use crate::phrase::Phrase;
use crate::settings::settings;

/// A table that blends several component tables.
///
/// Candidates are merged by target phrase; each feature score is the
/// weighted sum of the component scores, with `missing_score` standing in
/// for components that do not know the target. The merged list is ranked by
/// combined future score, best first, ties keeping first-seen order.
pub struct MultiModelTable {
    components: Vec<Arc<dyn PhraseTable>>,
    weights: Vec<f32>,
    missing_score: f32,
}

impl MultiModelTable {
    /// Components share equal weight until `weights` is set.
    pub fn new(components: Vec<Arc<dyn PhraseTable>>) -> Self {
        let n = components.len().max(1);
        Self {
            weights: vec![1.0 / n as f32; components.len()],
            components,
            missing_score: settings().multi_model.missing_score,
        }
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    fn combine(&self, per_component: Vec<Option<CandidateCollection>>) -> Option<CandidateCollection> {
        // (target, summed scores, components that contributed)
        let mut merged: Vec<(Phrase, Vec<f32>, Vec<bool>)> = Vec::new();
        let mut index: HashMap<Phrase, usize> = HashMap::new();
        let n = self.components.len();

        for (k, coll) in per_component.into_iter().enumerate() {
            let Some(coll) = coll else { continue };
            let w = self.weights[k];
            for target in coll.into_targets() {
                let idx = *index.entry(target.phrase.clone()).or_insert_with(|| {
                    merged.push((target.phrase.clone(), Vec::new(), vec![false; n]));
                    merged.len() - 1
                });
                let (_, scores, seen) = &mut merged[idx];
                if seen[k] {
                    // Same target listed twice by one component: keep the first.
                    continue;
                }
                seen[k] = true;
                if scores.len() < target.scores.len() {
                    scores.resize(target.scores.len(), 0.0);
                }
                for (acc, s) in scores.iter_mut().zip(&target.scores) {
                    *acc += w * s;
                }
            }
        }

        if merged.is_empty() {
            return None;
        }

        let mut targets: Vec<TargetPhrase> = merged
            .into_iter()
            .map(|(phrase, mut scores, seen)| {
                for (k, present) in seen.iter().enumerate() {
                    if !present {
                        for acc in scores.iter_mut() {
                            *acc += self.weights[k] * self.missing_score;
                        }
                    }
                }
                TargetPhrase::new(phrase, scores)
            })
            .collect();
        targets.sort_by(|a, b| {
            b.future_score
                .partial_cmp(&a.future_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Some(CandidateCollection::new(targets))
    }
}

impl PhraseTable for MultiModelTable {
    fn raw_lookup(&self, source: &Phrase) -> Option<CandidateCollection> {
        let per_component = self.components.iter().map(|c| c.raw_lookup(source)).collect();
        self.combine(per_component)
    }

    fn raw_lookup_batch(&self, sources: &[&Phrase]) -> Vec<Option<CandidateCollection>> {
        // One batch per component, then merge column-wise.
        let mut columns: Vec<std::vec::IntoIter<Option<CandidateCollection>>> = self
            .components
            .iter()
            .map(|c| c.raw_lookup_batch(sources).into_iter())
            .collect();
        debug!(
            phrases = sources.len(),
            components = columns.len(),
            "multi-model batch"
        );
        (0..sources.len())
            .map(|_| {
                let per_component = columns.iter_mut().map(|col| col.next().flatten()).collect();
                self.combine(per_component)
            })
            .collect()
    }

    fn provides_prefix_check(&self) -> bool {
        !self.components.is_empty() && self.components.iter().all(|c| c.provides_prefix_check())
    }

    fn prefix_exists(&self, prefix: &Phrase) -> bool {
        self.components.iter().any(|c| c.prefix_exists(prefix))
    }

    fn set_parameter(&mut self, key: &str, value: &str) -> Result<bool, ConfigError> {
        match key {
            // Resolved by the registry before the table is built.
            "components" => {
                let count = value.split(',').filter(|s| !s.is_empty()).count();
                if count != self.components.len() {
                    return Err(invalid(key, value, "component count changed after construction"));
                }
            }
            "weights" => {
                let weights = parse_f32_list(key, value)?;
                if weights.len() != self.components.len() {
                    return Err(invalid(
                        key,
                        value,
                        &format!("expected {} weights", self.components.len()),
                    ));
                }
                self.weights = weights;
            }
            "mode" => {
                if value != "interpolate" {
                    return Err(invalid(key, value, "only interpolate is supported"));
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::MemoryPhraseTable;

    fn table(text: &str) -> Arc<dyn PhraseTable> {
        Arc::new(MemoryPhraseTable::parse(text, None).unwrap())
    }

    fn model_a() -> Arc<dyn PhraseTable> {
        table("haus ||| house ||| 0.8\nhaus ||| home ||| 0.2\ndas ||| the ||| 0.9\n")
    }

    fn model_b() -> Arc<dyn PhraseTable> {
        table("haus ||| home ||| 0.9\nhaus ||| building ||| 0.1\nauto ||| car ||| 1.0\n")
    }

    fn targets(coll: &CandidateCollection) -> Vec<(String, f32)> {
        coll.iter()
            .map(|t| (t.phrase.to_string(), t.scores[0]))
            .collect()
    }

    #[test]
    fn test_interpolates_and_reranks() {
        let mut mm = MultiModelTable::new(vec![model_a(), model_b()]);
        mm.set_parameter("weights", "0.5,0.5").unwrap();
        let coll = mm.raw_lookup(&Phrase::parse("haus")).unwrap();
        let got = targets(&coll);
        assert_eq!(got.len(), 3);
        // home: 0.5*0.2 + 0.5*0.9 = 0.55; house: 0.4; building: 0.05
        assert_eq!(got[0].0, "home");
        assert!((got[0].1 - 0.55).abs() < 1e-6);
        assert_eq!(got[1].0, "house");
        assert!((got[1].1 - 0.4).abs() < 1e-6);
        assert_eq!(got[2].0, "building");
    }

    #[test]
    fn test_single_component_phrase() {
        let mm = MultiModelTable::new(vec![model_a(), model_b()]);
        let coll = mm.raw_lookup(&Phrase::parse("auto")).unwrap();
        assert_eq!(coll.len(), 1);
        assert!((coll.as_slice()[0].scores[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_everywhere_is_none() {
        let mm = MultiModelTable::new(vec![model_a(), model_b()]);
        assert!(mm.raw_lookup(&Phrase::parse("zelt")).is_none());
    }

    #[test]
    fn test_batch_matches_single() {
        let mm = MultiModelTable::new(vec![model_a(), model_b()]);
        let phrases: Vec<Phrase> = ["haus", "das", "zelt", "auto"]
            .iter()
            .map(|s| Phrase::parse(s))
            .collect();
        let refs: Vec<&Phrase> = phrases.iter().collect();
        let batch = mm.raw_lookup_batch(&refs);
        let single: Vec<_> = phrases.iter().map(|p| mm.raw_lookup(p)).collect();
        assert_eq!(batch, single);
    }

    #[test]
    fn test_prefix_exists_in_any_component() {
        let mm = MultiModelTable::new(vec![model_a(), model_b()]);
        assert!(mm.provides_prefix_check());
        assert!(mm.prefix_exists(&Phrase::parse("das")));
        assert!(mm.prefix_exists(&Phrase::parse("auto")));
        assert!(!mm.prefix_exists(&Phrase::parse("zelt")));
    }

    #[test]
    fn test_parameters() {
        let mut mm = MultiModelTable::new(vec![model_a(), model_b()]);
        assert_eq!(mm.weights(), &[0.5, 0.5]);
        assert!(mm.set_parameter("weights", "1.0").is_err());
        assert!(mm.set_parameter("mode", "max").is_err());
        assert_eq!(mm.set_parameter("mode", "interpolate"), Ok(true));
        assert_eq!(mm.set_parameter("components", "a,b"), Ok(true));
        assert!(mm.set_parameter("components", "a").is_err());
        assert_eq!(mm.set_parameter("lambda", "1"), Ok(false));
    }

    #[test]
    fn test_empty_model_has_no_prefix_check() {
        let mm = MultiModelTable::new(Vec::new());
        assert!(!mm.provides_prefix_check());
        assert!(mm.raw_lookup(&Phrase::parse("haus")).is_none());
    }
}
