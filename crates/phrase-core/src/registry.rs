//! The process-wide list of configured dictionaries.
//!
//! A `RegistryBuilder` turns configuration lines into loaded dictionaries
//! with contiguous ids in registration order. Once built, the registry is
//! read-only; `install` publishes it for the lifetime of the process.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::dict::{
    parse_config_line, ConfigError, DictionaryConfig, DictionaryId, LookupError,
    MemoryPhraseTable, MultiModelTable, PhraseDictionary, PhraseTable, TableError, TableKind,
};
use crate::input::{InputSpan, Sentence};
use crate::settings::settings;
use crate::worker::WorkerContext;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot load dictionary {name}: {source}")]
    Table {
        name: String,
        #[source]
        source: TableError,
    },

    #[error("configuration line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<RegistryError>,
    },

    #[error("a dictionary registry is already installed")]
    AlreadyInstalled,
}

pub struct Registry {
    dictionaries: Vec<PhraseDictionary>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Make this registry the process-wide one.
    pub fn install(self) -> Result<&'static Registry, RegistryError> {
        REGISTRY
            .set(self)
            .map_err(|_| RegistryError::AlreadyInstalled)?;
        REGISTRY.get().ok_or(RegistryError::AlreadyInstalled)
    }

    pub fn global() -> Option<&'static Registry> {
        REGISTRY.get()
    }

    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhraseDictionary> {
        self.dictionaries.iter()
    }

    pub fn get(&self, id: DictionaryId) -> Option<&PhraseDictionary> {
        self.dictionaries.get(id.0)
    }

    pub fn by_name(&self, name: &str) -> Option<&PhraseDictionary> {
        self.dictionaries.iter().find(|d| d.name() == name)
    }

    /// Longest span any dictionary will look up.
    pub fn max_phrase_length(&self) -> usize {
        self.dictionaries
            .iter()
            .map(PhraseDictionary::max_phrase_length)
            .max()
            .unwrap_or(settings().dictionary.max_phrase_length)
    }

    pub fn initialize_for_input(
        &self,
        ctx: &mut WorkerContext,
        sentence: &Sentence,
    ) -> Result<(), LookupError> {
        for dict in &self.dictionaries {
            dict.initialize_for_input(ctx, sentence)?;
        }
        Ok(())
    }

    pub fn clean_up_after_sentence(
        &self,
        ctx: &mut WorkerContext,
        sentence: &Sentence,
    ) -> Result<(), LookupError> {
        for dict in &self.dictionaries {
            dict.clean_up_after_sentence(ctx, sentence)?;
        }
        Ok(())
    }

    /// Fill every dictionary's slot on every span, in id order.
    pub fn lookup_batch(
        &self,
        ctx: &mut WorkerContext,
        spans: &mut [InputSpan],
    ) -> Result<(), LookupError> {
        for dict in &self.dictionaries {
            dict.lookup_batch(ctx, spans)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    dictionaries: Vec<PhraseDictionary>,
}

impl RegistryBuilder {
    fn next_id(&self) -> DictionaryId {
        DictionaryId(self.dictionaries.len())
    }

    fn component(&self, name: &str) -> Result<Arc<dyn PhraseTable>, ConfigError> {
        self.dictionaries
            .iter()
            .find(|d| d.name() == name)
            .map(|d| Arc::clone(d.engine()))
            .ok_or_else(|| ConfigError::UnknownComponent(name.to_string()))
    }

    fn build_engine(
        &self,
        kind: TableKind,
        pairs: &[(String, String)],
    ) -> Result<Arc<dyn PhraseTable>, ConfigError> {
        match kind {
            TableKind::Memory => Ok(Arc::new(MemoryPhraseTable::new())),
            TableKind::MultiModel => {
                let names = pairs
                    .iter()
                    .find(|(k, _)| k == "components")
                    .map(|(_, v)| v.as_str())
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key: "components".to_string(),
                        value: String::new(),
                        reason: "required for multi-model tables".to_string(),
                    })?;
                let components = names
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|name| self.component(name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arc::new(MultiModelTable::new(components)))
            }
            TableKind::External => Err(ConfigError::UnknownTableType(kind.to_string())),
        }
    }

    fn register(
        &mut self,
        config: DictionaryConfig,
        engine: Arc<dyn PhraseTable>,
        pairs: &[(String, String)],
    ) -> Result<DictionaryId, RegistryError> {
        let id = self.next_id();
        let mut dict = PhraseDictionary::new(id, config, engine);
        for (key, value) in pairs {
            dict.set_parameter(key, value)?;
        }
        if self.dictionaries.iter().any(|d| d.name() == dict.name()) {
            return Err(ConfigError::DuplicateName(dict.name().to_string()).into());
        }
        dict.load().map_err(|source| RegistryError::Table {
            name: dict.name().to_string(),
            source,
        })?;
        debug!(
            %id,
            name = dict.name(),
            kind = %dict.kind(),
            table_limit = dict.table_limit(),
            cache_size = dict.cache_size(),
            "registered dictionary"
        );
        self.dictionaries.push(dict);
        Ok(id)
    }

    /// Add a dictionary from `<TableType> key=value ...`. Unnamed
    /// dictionaries are called after their type and id.
    pub fn add_line(&mut self, line: &str) -> Result<DictionaryId, RegistryError> {
        let (kind, pairs) = parse_config_line(line)?;
        let engine = self.build_engine(kind, &pairs)?;
        let name = format!("{kind}{}", self.next_id().0);
        self.register(DictionaryConfig::new(name, kind), engine, &pairs)
    }

    /// Add a caller-built engine. `params` are applied as on a configuration
    /// line.
    pub fn add_table(
        &mut self,
        name: &str,
        engine: impl PhraseTable + 'static,
        params: &[(&str, &str)],
    ) -> Result<DictionaryId, RegistryError> {
        let pairs: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = DictionaryConfig::new(name, TableKind::External);
        self.register(config, Arc::new(engine), &pairs)
    }

    /// Add one dictionary per non-blank, non-comment line.
    pub fn add_config(&mut self, text: &str) -> Result<Vec<DictionaryId>, RegistryError> {
        let mut ids = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let id = self.add_line(line).map_err(|e| RegistryError::Line {
                line: idx + 1,
                source: Box::new(e),
            })?;
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn build(self) -> Registry {
        debug!(dictionaries = self.dictionaries.len(), "registry built");
        Registry {
            dictionaries: self.dictionaries,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::phrase::Phrase;
    use crate::testutil::{sample_table, CountingTable, SAMPLE_TABLE};

    fn table_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_ids_are_contiguous() {
        let a = table_file(SAMPLE_TABLE);
        let b = table_file("haus ||| building ||| 1.0\n");
        let config = format!(
            "# two tables and their mix\n\
             PhraseDictionaryMemory name=TM0 path={} table-limit=10\n\
             \n\
             PhraseDictionaryMemory path={} cache-size=50\n\
             PhraseDictionaryMultiModel name=mix components=TM0,PhraseDictionaryMemory1 weights=0.5,0.5\n",
            a.path().display(),
            b.path().display()
        );
        let mut builder = Registry::builder();
        let ids = builder.add_config(&config).unwrap();
        assert_eq!(ids, vec![DictionaryId(0), DictionaryId(1), DictionaryId(2)]);

        let registry = builder.build();
        assert_eq!(registry.len(), 3);
        let tm0 = registry.by_name("TM0").unwrap();
        assert_eq!(tm0.table_limit(), 10);
        assert_eq!(tm0.file_path(), Some(a.path()));
        let second = registry.get(DictionaryId(1)).unwrap();
        assert_eq!(second.name(), "PhraseDictionaryMemory1");
        assert_eq!(second.cache_size(), 50);
        assert_eq!(registry.by_name("mix").unwrap().kind(), TableKind::MultiModel);
    }

    #[test]
    fn test_registry_wide_sentence_cycle() {
        let mut builder = Registry::builder();
        builder.add_table("TM0", sample_table(), &[]).unwrap();
        let counting = CountingTable::new(sample_table());
        builder
            .add_table("TM1", counting, &[("table-limit", "1")])
            .unwrap();
        let registry = builder.build();

        let sentence = Sentence::parse(0, "das haus");
        let mut ctx = WorkerContext::new(0);
        let mut spans = sentence.spans(registry.max_phrase_length());
        assert!(registry.lookup_batch(&mut ctx, &mut spans).is_err());

        registry.initialize_for_input(&mut ctx, &sentence).unwrap();
        registry.lookup_batch(&mut ctx, &mut spans).unwrap();
        let das = &spans[0];
        assert_eq!(das.phrase(), &Phrase::parse("das"));
        assert_eq!(das.candidates(DictionaryId(0)).unwrap().len(), 2);
        assert_eq!(das.candidates(DictionaryId(1)).unwrap().len(), 1);
        registry.clean_up_after_sentence(&mut ctx, &sentence).unwrap();
        assert_eq!(ctx.cache_stats().len(), 2);
    }

    #[test]
    fn test_unbounded_max_phrase_length() {
        let unbounded = usize::MAX.to_string();
        let mut builder = Registry::builder();
        builder
            .add_table("TM0", sample_table(), &[("max-phrase-length", unbounded.as_str())])
            .unwrap();
        let registry = builder.build();
        assert_eq!(registry.max_phrase_length(), usize::MAX);

        let sentence = Sentence::parse(0, "das haus ist");
        let mut spans = sentence.spans(registry.max_phrase_length());
        assert_eq!(spans.len(), 6);
        let mut ctx = WorkerContext::new(0);
        registry.initialize_for_input(&mut ctx, &sentence).unwrap();
        registry.lookup_batch(&mut ctx, &mut spans).unwrap();
        registry.clean_up_after_sentence(&mut ctx, &sentence).unwrap();
        assert_eq!(spans[1].phrase(), &Phrase::parse("das haus"));
        assert_eq!(spans[1].candidates(DictionaryId(0)).unwrap().len(), 1);
    }

    #[test]
    fn test_config_errors() {
        let mut builder = Registry::builder();
        assert!(matches!(
            builder.add_line("PhraseDictionaryOnDisk path=x"),
            Err(RegistryError::Config(ConfigError::UnknownTableType(_)))
        ));
        assert!(matches!(
            builder.add_line("PhraseDictionaryMultiModel components=nope"),
            Err(RegistryError::Config(ConfigError::UnknownComponent(name))) if name == "nope"
        ));
        assert!(matches!(
            builder.add_line("PhraseDictionaryMultiModel weights=1"),
            Err(RegistryError::Config(ConfigError::InvalidValue { .. }))
        ));
        assert!(matches!(
            builder.add_line("PhraseDictionaryMemory name=TM0"),
            Err(RegistryError::Table {
                source: TableError::MissingPath(_),
                ..
            })
        ));
        assert!(matches!(
            builder.add_line("PhraseDictionaryMemory path=/tmp/x bogus=1"),
            Err(RegistryError::Config(ConfigError::UnknownParameter { .. }))
        ));
        // Nothing was registered, so ids start at 0.
        assert_eq!(builder.add_table("ok", sample_table(), &[]).unwrap(), DictionaryId(0));
        assert!(matches!(
            builder.add_table("ok", sample_table(), &[]),
            Err(RegistryError::Config(ConfigError::DuplicateName(_)))
        ));
    }

    #[test]
    fn test_config_error_names_line() {
        let mut builder = Registry::builder();
        let err = builder
            .add_config("# header\n\nPhraseDictionaryMemory cache-size=lots\n")
            .unwrap_err();
        assert!(matches!(err, RegistryError::Line { line: 3, .. }));
        assert!(err.to_string().starts_with("configuration line 3"));
    }

    #[test]
    fn test_install_once() {
        let mut builder = Registry::builder();
        builder.add_table("TM0", sample_table(), &[]).unwrap();
        let registry = builder.build().install().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(Registry::global().is_some());
        assert!(matches!(
            Registry::builder().build().install(),
            Err(RegistryError::AlreadyInstalled)
        ));
    }
}
