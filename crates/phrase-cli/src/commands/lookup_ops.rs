use std::process;

use serde::Serialize;

use phrase_core::input::Sentence;
use phrase_core::phrase::Phrase;
use phrase_core::worker::WorkerContext;

use super::load_registry;

#[derive(Serialize)]
struct CandidateView {
    target: String,
    scores: Vec<f32>,
}

#[derive(Serialize)]
struct LookupView<'a> {
    phrase: String,
    dictionary: &'a str,
    candidates: Vec<CandidateView>,
}

pub fn lookup(config_file: &str, phrases: &[String], json: bool) {
    let registry = load_registry(config_file);
    let mut ctx = WorkerContext::new(0);
    let sentence = Sentence::parse(0, &phrases.join(" "));
    die!(registry.initialize_for_input(&mut ctx, &sentence), "Error: {}");

    let mut views = Vec::new();
    for text in phrases {
        let phrase = Phrase::parse(text);
        for dict in registry.iter() {
            let result = die!(dict.lookup_single(&mut ctx, &phrase), "Error: {}");
            let candidates = result
                .iter()
                .flat_map(|c| c.iter())
                .map(|t| CandidateView {
                    target: t.phrase.to_string(),
                    scores: t.scores.clone(),
                })
                .collect();
            views.push(LookupView {
                phrase: phrase.to_string(),
                dictionary: dict.name(),
                candidates,
            });
        }
    }
    die!(
        registry.clean_up_after_sentence(&mut ctx, &sentence),
        "Error: {}"
    );

    if json {
        let out = die!(serde_json::to_string_pretty(&views), "Error: {}");
        println!("{out}");
        return;
    }
    for view in &views {
        if view.candidates.is_empty() {
            println!("{} [{}]: (none)", view.phrase, view.dictionary);
            continue;
        }
        println!("{} [{}]:", view.phrase, view.dictionary);
        for c in &view.candidates {
            let scores: Vec<String> = c.scores.iter().map(|s| format!("{s:.4}")).collect();
            println!("  {}\t{}", c.target, scores.join(" "));
        }
    }
}
