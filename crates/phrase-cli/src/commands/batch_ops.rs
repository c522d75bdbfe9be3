use std::fs;
use std::io;
use std::process;
use std::thread;

use serde::Serialize;
use tracing::{debug, debug_span};

use phrase_core::dict::LookupError;
use phrase_core::input::Sentence;
use phrase_core::registry::Registry;
use phrase_core::worker::WorkerContext;

use super::load_registry;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("sentence {sentence}: {source}")]
    Lookup {
        sentence: u64,
        #[source]
        source: LookupError,
    },

    #[error("cannot start worker: {0}")]
    Spawn(#[from] io::Error),

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}

#[derive(Debug, Serialize)]
pub struct SpanSummary {
    pub range: String,
    pub phrase: String,
    /// Candidate count per dictionary, in id order.
    pub counts: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct SentenceSummary {
    pub id: u64,
    pub worker: usize,
    pub spans: Vec<SpanSummary>,
}

#[derive(Debug, Serialize)]
pub struct CacheSummary {
    pub worker: usize,
    pub dictionary: String,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub dictionaries: Vec<String>,
    /// Dictionaries whose batches ran on their query pool. Pool threads keep
    /// their own caches, so `caches` only counts their single lookups.
    pub pooled: Vec<String>,
    pub sentences: Vec<SentenceSummary>,
    pub caches: Vec<CacheSummary>,
}

fn translate_sentence(
    registry: &Registry,
    ctx: &mut WorkerContext,
    sentence: &Sentence,
) -> Result<SentenceSummary, LookupError> {
    let _span = debug_span!("sentence", id = sentence.id(), worker = ctx.id()).entered();
    registry.initialize_for_input(ctx, sentence)?;
    let mut spans = sentence.spans(registry.max_phrase_length());
    let looked_up = registry.lookup_batch(ctx, &mut spans);
    // Always leave the worker ready for its next sentence.
    registry.clean_up_after_sentence(ctx, sentence)?;
    looked_up?;

    let spans = spans
        .iter()
        .map(|span| SpanSummary {
            range: span.range().to_string(),
            phrase: span.phrase().to_string(),
            counts: registry
                .iter()
                .map(|d| span.candidates(d.id()).map_or(0, |c| c.len()))
                .collect(),
        })
        .collect();
    Ok(SentenceSummary {
        id: sentence.id(),
        worker: ctx.id(),
        spans,
    })
}

fn run_worker(
    registry: &Registry,
    worker: usize,
    sentences: &[&Sentence],
) -> Result<(Vec<SentenceSummary>, Vec<CacheSummary>), BatchError> {
    let mut ctx = WorkerContext::new(worker);
    let mut summaries = Vec::with_capacity(sentences.len());
    for sentence in sentences {
        let summary =
            translate_sentence(registry, &mut ctx, sentence).map_err(|source| BatchError::Lookup {
                sentence: sentence.id(),
                source,
            })?;
        summaries.push(summary);
    }
    let caches = ctx
        .cache_stats()
        .into_iter()
        .map(|(id, entries, stats)| CacheSummary {
            worker,
            dictionary: registry
                .get(id)
                .map_or_else(|| id.to_string(), |d| d.name().to_string()),
            entries,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
        })
        .collect();
    debug!(worker, sentences = summaries.len(), "worker done");
    Ok((summaries, caches))
}

/// Look up every span of every sentence. Sentences are dealt round-robin to
/// `workers` threads, each with its own context; the report lists sentences
/// in input order.
pub fn run_batch(
    registry: &Registry,
    sentences: &[Sentence],
    workers: usize,
) -> Result<BatchReport, BatchError> {
    let workers = workers.clamp(1, sentences.len().max(1));
    let mut shares: Vec<Vec<&Sentence>> = vec![Vec::new(); workers];
    for (i, sentence) in sentences.iter().enumerate() {
        shares[i % workers].push(sentence);
    }

    let results = thread::scope(|scope| -> Result<Vec<_>, BatchError> {
        let mut handles = Vec::with_capacity(workers);
        for (worker, share) in shares.iter().enumerate() {
            let handle = thread::Builder::new()
                .name(format!("batch-worker-{worker}"))
                .spawn_scoped(scope, move || run_worker(registry, worker, share))?;
            handles.push(handle);
        }
        handles
            .into_iter()
            .enumerate()
            .map(|(worker, h)| h.join().map_err(|_| BatchError::WorkerPanicked(worker))?)
            .collect()
    })?;

    let mut report = BatchReport {
        dictionaries: registry.iter().map(|d| d.name().to_string()).collect(),
        pooled: registry
            .iter()
            .filter(|d| d.query_threads() > 0)
            .map(|d| d.name().to_string())
            .collect(),
        ..BatchReport::default()
    };
    for (summaries, caches) in results {
        report.sentences.extend(summaries);
        report.caches.extend(caches);
    }
    report.sentences.sort_by_key(|s| s.id);
    Ok(report)
}

/// One sentence per non-blank line, numbered from 0 in file order.
pub fn read_sentences(text: &str) -> Vec<Sentence> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(id, line)| Sentence::parse(id as u64, line))
        .collect()
}

pub fn batch(config_file: &str, input_file: &str, workers: usize, json: bool) {
    let text = die!(
        fs::read_to_string(input_file),
        "Error reading {input_file}: {}"
    );
    let registry = die!(load_registry(config_file).install(), "Error: {}");
    let sentences = read_sentences(&text);
    let report = die!(run_batch(registry, &sentences, workers), "Error: {}");

    if json {
        let out = die!(serde_json::to_string_pretty(&report), "Error: {}");
        println!("{out}");
        return;
    }
    for sentence in &report.sentences {
        let covered = sentence
            .spans
            .iter()
            .filter(|s| s.counts.iter().any(|&n| n > 0))
            .count();
        println!(
            "sentence {} (worker {}): {} spans, {} with candidates",
            sentence.id,
            sentence.worker,
            sentence.spans.len(),
            covered
        );
        for span in sentence.spans.iter().filter(|s| s.counts.iter().any(|&n| n > 0)) {
            let counts: Vec<String> = report
                .dictionaries
                .iter()
                .zip(&span.counts)
                .map(|(name, n)| format!("{name}:{n}"))
                .collect();
            println!("  {:<8} {:<30} {}", span.range, span.phrase, counts.join(" "));
        }
    }
    println!();
    if !report.pooled.is_empty() {
        println!(
            "pooled (batch lookups not in worker caches): {}",
            report.pooled.join(" ")
        );
    }
    for c in &report.caches {
        println!(
            "worker {} {}: entries={} hits={} misses={} evictions={}",
            c.worker, c.dictionary, c.entries, c.hits, c.misses, c.evictions
        );
    }
}
