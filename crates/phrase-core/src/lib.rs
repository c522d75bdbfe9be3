//! Phrase-table lookup for statistical machine translation decoders.
//!
//! Dictionaries are configured once into a [`registry::Registry`], then
//! queried by decoding workers through their own [`worker::WorkerContext`].

pub mod cache;
pub mod candidates;
pub mod dict;
pub mod input;
pub mod phrase;
pub mod registry;
pub mod settings;
pub mod task;
#[cfg(test)]
pub(crate) mod testutil;
pub mod worker;
