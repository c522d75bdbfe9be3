use std::fmt;
use std::path::PathBuf;

use crate::settings::{settings, Settings};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown parameter {key}={value}")]
    UnknownParameter { key: String, value: String },

    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("malformed parameter {0:?}, expected key=value")]
    MalformedPair(String),

    #[error("empty configuration line")]
    MissingTableType,

    #[error("unknown table type {0}")]
    UnknownTableType(String),

    #[error("unknown component dictionary {0}")]
    UnknownComponent(String),

    #[error("cannot change {0} on a table that is already shared")]
    Frozen(String),

    #[error("duplicate dictionary name {0}")]
    DuplicateName(String),
}

/// Storage engine selected by the first token of a configuration line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Memory,
    MultiModel,
    /// An engine constructed by the caller and handed to the registry.
    External,
}

impl TableKind {
    pub fn from_type_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "PhraseDictionaryMemory" => Ok(TableKind::Memory),
            "PhraseDictionaryMultiModel" => Ok(TableKind::MultiModel),
            other => Err(ConfigError::UnknownTableType(other.to_string())),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TableKind::Memory => "PhraseDictionaryMemory",
            TableKind::MultiModel => "PhraseDictionaryMultiModel",
            TableKind::External => "PhraseDictionaryExternal",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// The knobs that affect lookup results and caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupLimits {
    /// Max candidates per lookup; 0 = unlimited.
    pub table_limit: usize,
    /// Max cache entries per worker; 0 = caching disabled.
    pub cache_size: usize,
    /// Longer source phrases are never looked up.
    pub max_phrase_length: usize,
}

impl LookupLimits {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            table_limit: s.dictionary.table_limit,
            cache_size: s.dictionary.cache_size,
            max_phrase_length: s.dictionary.max_phrase_length,
        }
    }
}

impl Default for LookupLimits {
    fn default() -> Self {
        Self::from_settings(settings())
    }
}

/// Everything a configuration line can set on a dictionary, apart from
/// engine-specific keys.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryConfig {
    pub name: String,
    pub kind: TableKind,
    pub file_path: Option<PathBuf>,
    pub num_features: Option<usize>,
    pub input_factors: Vec<usize>,
    pub output_factors: Vec<usize>,
    pub tuneable: bool,
    pub limits: LookupLimits,
    pub query_threads: usize,
}

/// Same cap as `dictionary.query_threads` in the settings file.
const MAX_QUERY_THREADS: usize = 256;

impl DictionaryConfig {
    pub fn new(name: impl Into<String>, kind: TableKind) -> Self {
        let s = settings();
        Self {
            name: name.into(),
            kind,
            file_path: None,
            num_features: None,
            input_factors: vec![0],
            output_factors: vec![0],
            tuneable: true,
            limits: LookupLimits::from_settings(s),
            query_threads: s.dictionary.query_threads,
        }
    }

    /// Apply one core key. Returns `Ok(false)` for keys that belong to the
    /// storage engine.
    pub fn set_parameter(&mut self, key: &str, value: &str) -> Result<bool, ConfigError> {
        match key {
            "name" => {
                if value.is_empty() {
                    return Err(invalid(key, value, "must not be empty"));
                }
                self.name = value.to_string();
            }
            "path" => self.file_path = Some(PathBuf::from(value)),
            "num-features" => self.num_features = Some(parse_usize(key, value)?),
            "input-factor" => self.input_factors = parse_factor_list(key, value)?,
            "output-factor" => self.output_factors = parse_factor_list(key, value)?,
            "tuneable" => self.tuneable = parse_bool(key, value)?,
            "table-limit" => self.limits.table_limit = parse_usize(key, value)?,
            "cache-size" => self.limits.cache_size = parse_usize(key, value)?,
            "max-phrase-length" => {
                let n = parse_usize(key, value)?;
                if n == 0 {
                    return Err(invalid(key, value, "must be positive"));
                }
                self.limits.max_phrase_length = n;
            }
            "query-threads" => {
                let n = parse_usize(key, value)?;
                if n > MAX_QUERY_THREADS {
                    return Err(invalid(
                        key,
                        value,
                        &format!("must be at most {MAX_QUERY_THREADS}"),
                    ));
                }
                self.query_threads = n;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Split `Type key=value key=value ...` into the table kind and its pairs.
pub fn parse_config_line(line: &str) -> Result<(TableKind, Vec<(String, String)>), ConfigError> {
    let mut tokens = line.split_whitespace();
    let type_name = tokens.next().ok_or(ConfigError::MissingTableType)?;
    let kind = TableKind::from_type_name(type_name)?;
    let pairs = tokens
        .map(|tok| {
            tok.split_once('=')
                .filter(|(k, _)| !k.is_empty())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| ConfigError::MalformedPair(tok.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((kind, pairs))
}

pub(crate) fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub(crate) fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(key, value, "expected a non-negative integer"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(invalid(key, value, "expected true or false")),
    }
}

fn parse_factor_list(key: &str, value: &str) -> Result<Vec<usize>, ConfigError> {
    value.split(',').map(|v| parse_usize(key, v)).collect()
}

pub(crate) fn parse_f32_list(key: &str, value: &str) -> Result<Vec<f32>, ConfigError> {
    value
        .split(',')
        .map(|v| {
            v.parse::<f32>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or_else(|| invalid(key, value, "expected comma-separated numbers"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_line() {
        let (kind, pairs) = parse_config_line(
            "PhraseDictionaryMemory name=TM0 num-features=4 path=/tmp/pt.txt table-limit=20",
        )
        .unwrap();
        assert_eq!(kind, TableKind::Memory);
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0], ("name".to_string(), "TM0".to_string()));
        assert_eq!(pairs[2], ("path".to_string(), "/tmp/pt.txt".to_string()));
    }

    #[test]
    fn test_parse_config_line_value_may_contain_equals() {
        let (_, pairs) = parse_config_line("PhraseDictionaryMemory path=a=b").unwrap();
        assert_eq!(pairs[0], ("path".to_string(), "a=b".to_string()));
    }

    #[test]
    fn test_parse_config_line_errors() {
        assert_eq!(parse_config_line("   "), Err(ConfigError::MissingTableType));
        assert_eq!(
            parse_config_line("PhraseDictionaryCompact path=x"),
            Err(ConfigError::UnknownTableType(
                "PhraseDictionaryCompact".to_string()
            ))
        );
        assert_eq!(
            parse_config_line("PhraseDictionaryMemory table-limit"),
            Err(ConfigError::MalformedPair("table-limit".to_string()))
        );
        assert_eq!(
            parse_config_line("PhraseDictionaryMemory =5"),
            Err(ConfigError::MalformedPair("=5".to_string()))
        );
    }

    #[test]
    fn test_defaults_come_from_settings() {
        let config = DictionaryConfig::new("TM0", TableKind::Memory);
        assert_eq!(config.limits.table_limit, settings().dictionary.table_limit);
        assert_eq!(config.limits.cache_size, settings().dictionary.cache_size);
        assert_eq!(config.input_factors, vec![0]);
    }

    #[test]
    fn test_set_core_parameters() {
        let mut config = DictionaryConfig::new("TM0", TableKind::Memory);
        assert_eq!(config.set_parameter("table-limit", "5"), Ok(true));
        assert_eq!(config.set_parameter("cache-size", "0"), Ok(true));
        assert_eq!(config.set_parameter("input-factor", "0,1"), Ok(true));
        assert_eq!(config.set_parameter("tuneable", "false"), Ok(true));
        assert_eq!(config.limits.table_limit, 5);
        assert_eq!(config.limits.cache_size, 0);
        assert_eq!(config.input_factors, vec![0, 1]);
        assert!(!config.tuneable);
    }

    #[test]
    fn test_engine_keys_are_not_claimed() {
        let mut config = DictionaryConfig::new("TM0", TableKind::Memory);
        assert_eq!(config.set_parameter("weights", "0.5,0.5"), Ok(false));
    }

    #[test]
    fn test_malformed_values_name_key_and_value() {
        let mut config = DictionaryConfig::new("TM0", TableKind::Memory);
        let err = config.set_parameter("table-limit", "-3").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("table-limit"));
        assert!(msg.contains("-3"));

        assert!(config.set_parameter("max-phrase-length", "0").is_err());
        assert!(config.set_parameter("query-threads", "100000").is_err());
        assert!(config.set_parameter("tuneable", "maybe").is_err());
        assert!(config.set_parameter("name", "").is_err());
    }

    #[test]
    fn test_parse_f32_list() {
        assert_eq!(parse_f32_list("weights", "0.25,0.75"), Ok(vec![0.25, 0.75]));
        assert!(parse_f32_list("weights", "0.25,x").is_err());
        assert!(parse_f32_list("weights", "inf").is_err());
    }
}
