//! Source/target phrases, factored words, word ranges and fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between factors of one token (`surface|lemma|pos`).
pub const FACTOR_DELIMITER: char = '|';

/// A single token: one or more factors, surface form first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Word {
    factors: Vec<String>,
}

impl Word {
    pub fn new(surface: impl Into<String>) -> Self {
        Self {
            factors: vec![surface.into()],
        }
    }

    /// Parse a `surface|factor|factor` token. Empty trailing factors are kept
    /// so positions stay aligned with the factor configuration.
    pub fn from_factored(token: &str) -> Self {
        Self {
            factors: token.split(FACTOR_DELIMITER).map(str::to_string).collect(),
        }
    }

    pub fn surface(&self) -> &str {
        &self.factors[0]
    }

    pub fn factor(&self, index: usize) -> Option<&str> {
        self.factors.get(index).map(String::as_str)
    }

    pub fn factors(&self) -> &[String] {
        &self.factors
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, factor) in self.factors.iter().enumerate() {
            if i > 0 {
                write!(f, "{FACTOR_DELIMITER}")?;
            }
            f.write_str(factor)?;
        }
        Ok(())
    }
}

/// An immutable sequence of words.
///
/// Ordering is lexicographic over words, so every phrase that starts with a
/// given prefix sorts contiguously right after that prefix. Storage engines
/// rely on this for range-based prefix checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Phrase {
    words: Vec<Word>,
}

impl Phrase {
    pub fn new(words: Vec<Word>) -> Self {
        Self { words }
    }

    /// Whitespace-tokenize `text`, reading each token as a factored word.
    pub fn parse(text: &str) -> Self {
        Self {
            words: text.split_whitespace().map(Word::from_factored).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn word(&self, index: usize) -> Option<&Word> {
        self.words.get(index)
    }

    /// Copy of the words covered by `range`. Out-of-bounds parts are clipped.
    pub fn sub_phrase(&self, range: WordsRange) -> Phrase {
        let end = range.end.min(self.words.len());
        let start = range.start.min(end);
        Phrase {
            words: self.words[start..end].to_vec(),
        }
    }

    pub fn starts_with(&self, prefix: &Phrase) -> bool {
        self.words.starts_with(&prefix.words)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }
}

impl fmt::Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, word) in self.words.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{word}")?;
        }
        Ok(())
    }
}

impl From<&str> for Phrase {
    fn from(text: &str) -> Self {
        Phrase::parse(text)
    }
}

impl FromIterator<Word> for Phrase {
    fn from_iter<I: IntoIterator<Item = Word>>(iter: I) -> Self {
        Phrase {
            words: iter.into_iter().collect(),
        }
    }
}

/// Half-open range `[start, end)` of token positions in a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WordsRange {
    pub start: usize,
    pub end: usize,
}

impl WordsRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start {start} past end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }
}

impl fmt::Display for WordsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{})", self.start, self.end)
    }
}

/// Cache key for a source phrase.
///
/// `Phrase` keys are a blake3 digest of the factor sequence. `Node` keys are
/// the identity of a pre-resolved storage-engine node, used when the engine
/// can name the phrase more cheaply than hashing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Phrase([u8; 32]),
    Node(u64),
}

impl Fingerprint {
    pub fn of(phrase: &Phrase) -> Self {
        let mut hasher = blake3::Hasher::new();
        // Length prefixes keep ["ab"] and ["a", "b"] apart.
        hasher.update(&(phrase.len() as u64).to_le_bytes());
        for word in phrase.words() {
            hasher.update(&(word.factors.len() as u64).to_le_bytes());
            for factor in &word.factors {
                hasher.update(&(factor.len() as u64).to_le_bytes());
                hasher.update(factor.as_bytes());
            }
        }
        Fingerprint::Phrase(*hasher.finalize().as_bytes())
    }
}
