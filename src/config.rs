//! Configuration for tidegen

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::options::Settings;

/// tidegen configuration
///
/// ```toml
/// output = "generated"
/// log_level = "info"
///
/// [provider]
/// strict = true
///
/// [generators.python]
/// base_package = "robot.msgs"
///
/// [generators.csharp]
/// namespace = "Game.Net"
/// partial_class = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Output root directory
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Base directory for template overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<PathBuf>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Settings for the input provider
    #[serde(default)]
    pub provider: Settings,

    /// Settings per generator, keyed by generator name
    #[serde(default)]
    pub generators: BTreeMap<String, Settings>,
}

fn default_output() -> PathBuf {
    PathBuf::from("generated")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: default_output(),
            templates: None,
            log_level: default_log_level(),
            provider: Settings::default(),
            generators: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "tidegen", "tidegen")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("tidegen.toml"))
    }

    /// Settings for one generator, empty when not configured
    pub fn generator_settings(&self, name: &str) -> Settings {
        self.generators.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.output, PathBuf::from("generated"));
        assert_eq!(config.log_level, "info");
        assert!(config.generator_settings("python").is_empty());
    }

    #[test]
    fn test_generator_tables() {
        let config: Config = toml::from_str(
            r#"
output = "out"

[provider]
strict = true

[generators.csharp]
namespace = "Game.Net"
partial_class = true
"#,
        )
        .unwrap();

        assert_eq!(config.output, PathBuf::from("out"));
        assert!(config.provider.bool("strict"));
        let csharp = config.generator_settings("csharp");
        assert_eq!(csharp.string("namespace"), "Game.Net");
        assert!(csharp.bool("partial_class"));
    }

    #[test]
    fn test_save_and_load() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.templates = Some(PathBuf::from("templates"));
        config
            .generators
            .insert("python".into(), Settings::new().with("base_package", "robot"));

        config.save(file.path()).unwrap();
        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "output = 3\n").unwrap();
        assert!(matches!(Config::load(file.path()), Err(crate::Error::Config(_))));
    }
}
