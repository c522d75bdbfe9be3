//! Phrase dictionaries: the lookup contract the decoder talks to, and the
//! storage-engine contract it is built on.
//!
//! `PhraseDictionary` is what the decoder holds. It owns configuration, the
//! cache policy, batch dispatch and the per-sentence lifecycle. The actual
//! table behind it is any `PhraseTable` implementation: `MemoryPhraseTable`,
//! `MultiModelTable`, or an external engine registered by the caller.

mod config;
mod memory;
mod multi_model;
mod phrase_dictionary;
pub(crate) mod resolver;
pub mod rule_lookup;
#[cfg(test)]
mod tests;

use std::fmt;
use std::io;

use crate::candidates::CandidateCollection;
use crate::input::Sentence;
use crate::phrase::Phrase;

pub use config::{parse_config_line, ConfigError, DictionaryConfig, LookupLimits, TableKind};
pub use memory::MemoryPhraseTable;
pub use multi_model::MultiModelTable;
pub use phrase_dictionary::PhraseDictionary;
pub use rule_lookup::{ChartContext, RuleLookupManager};

/// Contiguous id of a registered dictionary, starting from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DictionaryId(pub usize);

impl fmt::Display for DictionaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors surfaced by lookups. Misses are not errors; these are all misuse
/// of the dictionary lifecycle or of an unsupported capability.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("dictionary {dictionary} used before initialize_for_input")]
    NotInitialized { dictionary: String },

    #[error("dictionary {dictionary} initialized twice without cleanup")]
    AlreadyInitialized { dictionary: String },

    #[error("dictionary {dictionary} does not support hierarchical rule lookup")]
    RuleLookupUnsupported { dictionary: String },
}

/// Errors raised while a storage engine loads its data.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("no path configured for {0}")]
    MissingPath(String),
}

/// Raw lookup primitives exposed by a storage engine.
///
/// The core only calls `raw_lookup`/`raw_lookup_batch` on a cache miss. All
/// other methods have conservative defaults so a minimal engine only needs
/// to implement `raw_lookup`.
pub trait PhraseTable: Send + Sync {
    /// Candidates for `source` in the engine's own ranking, or `None`.
    fn raw_lookup(&self, source: &Phrase) -> Option<CandidateCollection>;

    /// Resolve several phrases in one call. Engines that can share I/O or
    /// trie walks across phrases override this. The result has one element
    /// per input phrase, in order.
    fn raw_lookup_batch(&self, sources: &[&Phrase]) -> Vec<Option<CandidateCollection>> {
        sources.iter().map(|s| self.raw_lookup(s)).collect()
    }

    fn provides_prefix_check(&self) -> bool {
        false
    }

    /// Whether any entry starts with `prefix`. Only meaningful when
    /// `provides_prefix_check` is true.
    fn prefix_exists(&self, _prefix: &Phrase) -> bool {
        true
    }

    /// Stable identity of the table node for `source`, if the engine has one
    /// that is cheaper to obtain than a content hash.
    fn node_id(&self, _source: &Phrase) -> Option<u64> {
        None
    }

    /// Engine-specific configuration key. `Ok(false)` means not recognized.
    fn set_parameter(&mut self, _key: &str, _value: &str) -> Result<bool, ConfigError> {
        Ok(false)
    }

    /// Load table data once configuration is complete.
    fn load(&mut self, _config: &DictionaryConfig) -> Result<(), TableError> {
        Ok(())
    }

    fn initialize_for_input(&self, _sentence: &Sentence) {}

    fn clean_up_after_sentence(&self, _sentence: &Sentence) {}

    fn create_rule_lookup_manager(
        &self,
        _chart: &ChartContext<'_>,
    ) -> Option<Box<dyn RuleLookupManager>> {
        None
    }

    /// Called when a decoder is done with a collection it received.
    fn release(&self, _candidates: &CandidateCollection) {}
}
