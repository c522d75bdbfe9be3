use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, debug_span};

use super::rule_lookup::{ChartContext, FlatRuleLookup, RuleLookupManager};
use super::{DictionaryConfig, PhraseTable, TableError};
use crate::candidates::{CandidateCollection, TargetPhrase};
use crate::phrase::Phrase;

const FIELD_SEPARATOR: &str = "|||";

type Entries = BTreeMap<Phrase, CandidateCollection>;

/// A phrase table held entirely in memory, keyed by source phrase.
///
/// Candidates keep the order in which they were added, which is the ranking
/// the table reports. The sorted map gives prefix checks for free.
#[derive(Debug, Default)]
pub struct MemoryPhraseTable {
    entries: Arc<Entries>,
}

impl MemoryPhraseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (Phrase, Vec<TargetPhrase>)>) -> Self {
        let mut map = Entries::new();
        for (source, targets) in entries {
            let coll = map.entry(source).or_default();
            for t in targets {
                coll.push(t);
            }
        }
        Self {
            entries: Arc::new(map),
        }
    }

    /// Parse `source ||| target ||| scores [||| ...]` lines. Fields after the
    /// scores (alignments, counts) are ignored.
    pub fn parse(text: &str, num_features: Option<usize>) -> Result<Self, TableError> {
        let _span = debug_span!("parse_phrase_table").entered();
        let mut parsed = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            parsed.push(parse_line(line, idx + 1, num_features)?);
        }
        let table = Self::from_entries(parsed.into_iter().map(|(s, t)| (s, vec![t])));
        let (sources, targets) = table.stats();
        debug!(sources, targets, "parsed phrase table");
        Ok(table)
    }

    pub fn open(path: &Path, num_features: Option<usize>) -> Result<Self, TableError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, num_features)
    }

    /// Returns (source_count, target_count).
    pub fn stats(&self) -> (usize, usize) {
        let targets = self.entries.values().map(|c| c.len()).sum();
        (self.entries.len(), targets)
    }
}

fn parse_line(
    line: &str,
    line_no: usize,
    num_features: Option<usize>,
) -> Result<(Phrase, TargetPhrase), TableError> {
    let err = |reason: String| TableError::Parse {
        line: line_no,
        reason,
    };
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
    if fields.len() < 3 {
        return Err(err(format!(
            "expected at least 3 fields separated by {FIELD_SEPARATOR}, found {}",
            fields.len()
        )));
    }
    let source = Phrase::parse(fields[0]);
    let target = Phrase::parse(fields[1]);
    if source.is_empty() || target.is_empty() {
        return Err(err("empty source or target phrase".to_string()));
    }
    let scores = fields[2]
        .split_whitespace()
        .map(|s| s.parse::<f32>().map_err(|_| err(format!("invalid score {s:?}"))))
        .collect::<Result<Vec<f32>, _>>()?;
    if let Some(n) = num_features {
        if scores.len() != n {
            return Err(err(format!("expected {n} scores, found {}", scores.len())));
        }
    }
    Ok((source, TargetPhrase::new(target, scores)))
}

impl PhraseTable for MemoryPhraseTable {
    fn raw_lookup(&self, source: &Phrase) -> Option<CandidateCollection> {
        self.entries.get(source).cloned()
    }

    fn provides_prefix_check(&self) -> bool {
        true
    }

    fn prefix_exists(&self, prefix: &Phrase) -> bool {
        self.entries
            .range(prefix..)
            .next()
            .is_some_and(|(source, _)| source.starts_with(prefix))
    }

    fn load(&mut self, config: &DictionaryConfig) -> Result<(), TableError> {
        match &config.file_path {
            Some(path) => {
                let loaded = Self::open(path, config.num_features)?;
                self.entries = loaded.entries;
                Ok(())
            }
            // Tables built in code need no file.
            None if !self.entries.is_empty() => Ok(()),
            None => Err(TableError::MissingPath(config.name.clone())),
        }
    }

    fn create_rule_lookup_manager(
        &self,
        chart: &ChartContext<'_>,
    ) -> Option<Box<dyn RuleLookupManager>> {
        let entries = Arc::clone(&self.entries);
        Some(Box::new(FlatRuleLookup::new(chart, move |phrase: &Phrase| {
            let coll = entries.get(phrase).filter(|c| !c.is_empty())?;
            Some(Arc::new(coll.clone()))
        })))
    }
}
