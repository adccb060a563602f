//! Registry of data providers and generators, keyed by name

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::generator::{CSharpGenerator, Generator, MsgFileGenerator, PythonGenerator};
use crate::provider::{DataProvider, MsgFileProvider};
use crate::{Error, Result};

/// Explicitly registered providers and generators
#[derive(Default)]
pub struct Registry {
    providers: BTreeMap<&'static str, Box<dyn DataProvider>>,
    generators: BTreeMap<&'static str, Box<dyn Generator>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in provider and generators. `templates` is the base directory
    /// for template overrides.
    pub fn with_defaults(templates: Option<PathBuf>) -> Self {
        let mut registry = Self::new();
        registry.register_provider(Box::new(MsgFileProvider::new()));
        registry.register_generator(Box::new(PythonGenerator::new(templates.clone())));
        registry.register_generator(Box::new(CSharpGenerator::new(templates.clone())));
        registry.register_generator(Box::new(MsgFileGenerator::new(templates)));
        registry
    }

    /// Register a provider, replacing any with the same name
    pub fn register_provider(&mut self, provider: Box<dyn DataProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    /// Register a generator, replacing any with the same name
    pub fn register_generator(&mut self, generator: Box<dyn Generator>) {
        self.generators.insert(generator.name(), generator);
    }

    pub fn provider(&self, name: &str) -> Result<&dyn DataProvider> {
        self.providers
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))
    }

    pub fn generator(&self, name: &str) -> Result<&dyn Generator> {
        self.generators
            .get(name)
            .map(|g| g.as_ref())
            .ok_or_else(|| Error::UnknownGenerator(name.to_string()))
    }

    pub fn providers(&self) -> impl Iterator<Item = &dyn DataProvider> {
        self.providers.values().map(|p| p.as_ref())
    }

    pub fn generators(&self) -> impl Iterator<Item = &dyn Generator> {
        self.generators.values().map(|g| g.as_ref())
    }

    pub fn generator_names(&self) -> Vec<&'static str> {
        self.generators.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Message, MessageDatabase};
    use crate::options::{OptionSpec, Settings};
    use crate::generator::GenerationOutput;

    struct NullGenerator;

    impl Generator for NullGenerator {
        fn name(&self) -> &'static str {
            "null"
        }

        fn language(&self) -> &'static str {
            "nothing"
        }

        fn options(&self) -> Vec<OptionSpec> {
            Vec::new()
        }

        fn generate<'a>(
            &self,
            _db: &'a MessageDatabase,
            _selection: &[&'a Message],
            _settings: &Settings,
        ) -> Result<GenerationOutput> {
            Ok(GenerationOutput {
                subdir: "null",
                package_marker: None,
                files: Vec::new(),
                missing: Vec::new(),
            })
        }
    }

    #[test]
    fn test_defaults_registered() {
        let registry = Registry::with_defaults(None);
        assert_eq!(registry.generator_names(), vec!["csharp", "msg", "python"]);
        assert_eq!(registry.provider("msg_files").unwrap().name(), "msg_files");
        assert_eq!(registry.providers().count(), 1);
    }

    #[test]
    fn test_unknown_lookups() {
        let registry = Registry::with_defaults(None);
        assert!(matches!(registry.generator("java"), Err(Error::UnknownGenerator(_))));
        assert!(matches!(registry.provider("db"), Err(Error::UnknownProvider(_))));
    }

    #[test]
    fn test_register_custom_generator() {
        let mut registry = Registry::new();
        registry.register_generator(Box::new(NullGenerator));

        let generator = registry.generator("null").unwrap();
        let output = generator.generate(&MessageDatabase::new(), &[], &Settings::new()).unwrap();
        assert!(output.files.is_empty());
        assert_eq!(registry.generators().count(), 1);
    }
}
