use std::fs;
use std::process;

use phrase_core::settings;

pub fn settings_export() {
    print!("{}", settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(settings::parse_settings_toml(&content), "Error: {}");
    println!(
        "OK: dictionary.table_limit={}, dictionary.cache_size={}, dictionary.max_phrase_length={}, dictionary.query_threads={}",
        s.dictionary.table_limit,
        s.dictionary.cache_size,
        s.dictionary.max_phrase_length,
        s.dictionary.query_threads
    );
}

/// Install a custom settings file before anything reads the defaults.
pub fn use_settings(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    die!(settings::init_custom(content), "Error in {file}: {}");
}
