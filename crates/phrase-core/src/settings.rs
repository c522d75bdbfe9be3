//! Global lookup defaults loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`
//!
//! Per-dictionary configuration lines start from these values and override
//! them key by key (see [`crate::dict::DictionaryConfig`]).

use std::sync::OnceLock;

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub dictionary: DictionarySettings,
    pub multi_model: MultiModelSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DictionarySettings {
    pub table_limit: usize,
    pub cache_size: usize,
    pub max_phrase_length: usize,
    pub query_threads: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiModelSettings {
    pub missing_score: f32,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

/// Upper bound on `dictionary.query_threads`; larger pools only add contention
/// on the engine.
const MAX_QUERY_THREADS: usize = 256;

fn validate(s: &Settings) -> Result<(), SettingsError> {
    if s.dictionary.max_phrase_length == 0 {
        return Err(SettingsError::InvalidValue {
            field: "dictionary.max_phrase_length".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if s.dictionary.query_threads > MAX_QUERY_THREADS {
        return Err(SettingsError::InvalidValue {
            field: "dictionary.query_threads".to_string(),
            reason: format!("must be at most {MAX_QUERY_THREADS}"),
        });
    }
    if !s.multi_model.missing_score.is_finite() {
        return Err(SettingsError::InvalidValue {
            field: "multi_model.missing_score".to_string(),
            reason: "must be finite".to_string(),
        });
    }
    Ok(())
}
