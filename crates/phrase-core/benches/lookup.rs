use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use phrase_core::candidates::TargetPhrase;
use phrase_core::dict::{
    DictionaryConfig, DictionaryId, MemoryPhraseTable, PhraseDictionary, TableKind,
};
use phrase_core::input::Sentence;
use phrase_core::phrase::Phrase;
use phrase_core::worker::WorkerContext;

const VOCAB: &[&str] = &[
    "das", "haus", "ist", "klein", "der", "mann", "geht", "nach", "hause", "heute", "und",
    "morgen", "wir", "sehen", "uns",
];

/// Every one- and two-word phrase over the vocabulary, 8 candidates each.
fn bench_table() -> MemoryPhraseTable {
    let mut entries = Vec::new();
    for a in VOCAB {
        let sources = std::iter::once(a.to_string())
            .chain(VOCAB.iter().map(|b| format!("{a} {b}")));
        for source in sources {
            let targets = (0..8)
                .map(|i| {
                    TargetPhrase::new(Phrase::parse(&format!("{source}-{i}")), vec![-(i as f32)])
                })
                .collect();
            entries.push((Phrase::parse(&source), targets));
        }
    }
    MemoryPhraseTable::from_entries(entries)
}

fn bench_dictionary(cache_size: &str, query_threads: &str) -> PhraseDictionary {
    let config = DictionaryConfig::new("bench", TableKind::Memory);
    let mut dict = PhraseDictionary::new(DictionaryId(0), config, Arc::new(bench_table()));
    dict.set_parameter("cache-size", cache_size).unwrap();
    dict.set_parameter("query-threads", query_threads).unwrap();
    dict.set_parameter("table-limit", "4").unwrap();
    dict.load().unwrap();
    dict
}

static INPUTS: &[(&str, &str)] = &[
    ("short", "das haus ist klein"),
    ("medium", "der mann geht heute nach hause und wir sehen uns"),
    (
        "long",
        "heute geht der mann nach hause und morgen sehen wir uns und das haus ist klein",
    ),
];

fn bench_batch(c: &mut Criterion, group_name: &str, cache_size: &str, query_threads: &str) {
    let dict = bench_dictionary(cache_size, query_threads);
    let mut ctx = WorkerContext::new(0);
    let mut group = c.benchmark_group(group_name);
    for &(label, text) in INPUTS {
        let sentence = Sentence::parse(0, text);
        group.bench_with_input(
            BenchmarkId::new(label, sentence.len()),
            &sentence,
            |b, sentence| {
                b.iter(|| {
                    dict.initialize_for_input(&mut ctx, sentence).unwrap();
                    let mut spans = sentence.spans(dict.max_phrase_length());
                    dict.lookup_batch(&mut ctx, &mut spans).unwrap();
                    dict.clean_up_after_sentence(&mut ctx, sentence).unwrap();
                    spans
                });
            },
        );
    }
    group.finish();
}

fn bench_cached(c: &mut Criterion) {
    bench_batch(c, "lookup/cached", "10000", "0");
}

fn bench_uncached(c: &mut Criterion) {
    bench_batch(c, "lookup/uncached", "0", "0");
}

fn bench_pooled(c: &mut Criterion) {
    bench_batch(c, "lookup/pooled", "10000", "4");
}

criterion_group!(benches, bench_cached, bench_uncached, bench_pooled);
criterion_main!(benches);
