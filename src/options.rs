//! Configuration schema for providers and generators
//!
//! Every provider and generator describes its options as an ordered list of
//! [`OptionSpec`]s. A front end renders that list however it likes; the core
//! only ever sees a plain [`Settings`] record, which [`Settings::resolve`]
//! validates against the schema before a run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Value type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Bool,
    String,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Bool => write!(f, "bool"),
            OptionKind::String => write!(f, "string"),
        }
    }
}

/// A single option value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    String(String),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Bool(_) => OptionKind::Bool,
            OptionValue::String(_) => OptionKind::String,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

/// Declaration of one configuration option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSpec {
    pub key: &'static str,
    pub kind: OptionKind,
    /// `None` makes the option mandatory
    pub default: Option<OptionValue>,
    /// Bool option that, when set, makes this string option mandatory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_when: Option<&'static str>,
    pub description: &'static str,
}

impl OptionSpec {
    /// Bool option with a default
    pub fn flag(key: &'static str, default: bool, description: &'static str) -> Self {
        Self {
            key,
            kind: OptionKind::Bool,
            default: Some(OptionValue::Bool(default)),
            required_when: None,
            description,
        }
    }

    /// String option with a default
    pub fn text(key: &'static str, default: &str, description: &'static str) -> Self {
        Self {
            key,
            kind: OptionKind::String,
            default: Some(OptionValue::from(default)),
            required_when: None,
            description,
        }
    }

    /// String option that must be non-empty whenever `flag` is set
    pub fn text_required_when(key: &'static str, flag: &'static str, description: &'static str) -> Self {
        Self {
            required_when: Some(flag),
            ..Self::text(key, "", description)
        }
    }
}

/// Plain key/value configuration record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, OptionValue>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<OptionValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    /// Bool value of `key`, false when absent
    pub fn bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(OptionValue::Bool(true)))
    }

    /// String value of `key`, empty when absent
    pub fn string(&self, key: &str) -> &str {
        match self.values.get(key) {
            Some(OptionValue::String(s)) => s,
            _ => "",
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Validate against `schema` and fill in defaults.
    ///
    /// `owner` names the provider or generator in error messages.
    pub fn resolve(&self, schema: &[OptionSpec], owner: &str) -> Result<Settings> {
        for key in self.values.keys() {
            if !schema.iter().any(|spec| spec.key == key) {
                return Err(Error::Config(format!("{}: unknown option '{}'", owner, key)));
            }
        }

        let mut resolved = Settings::new();
        for spec in schema {
            let value = match (self.values.get(spec.key), &spec.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(Error::Config(format!("{}: missing required option '{}'", owner, spec.key)));
                }
            };
            if value.kind() != spec.kind {
                return Err(Error::Config(format!(
                    "{}: option '{}' expects a {} value, got {}",
                    owner, spec.key, spec.kind, value
                )));
            }
            resolved.values.insert(spec.key.to_string(), value);
        }

        for spec in schema {
            if let Some(flag) = spec.required_when {
                if resolved.bool(flag) && resolved.string(spec.key).is_empty() {
                    return Err(Error::Config(format!(
                        "{}: option '{}' is required when '{}' is set",
                        owner, spec.key, flag
                    )));
                }
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<OptionSpec> {
        vec![
            OptionSpec::text("base_package", "", "Root package"),
            OptionSpec::flag("common_super_class", false, "Derive from a shared class"),
            OptionSpec::text_required_when("super_class_name", "common_super_class", "Shared class name"),
        ]
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let resolved = Settings::new().resolve(&schema(), "python").unwrap();
        assert_eq!(resolved.string("base_package"), "");
        assert!(!resolved.bool("common_super_class"));
        assert_eq!(resolved.get("super_class_name"), Some(&OptionValue::from("")));
    }

    #[test]
    fn test_resolve_rejects_unknown_key() {
        let err = Settings::new().with("colour", "blue").resolve(&schema(), "python").unwrap_err();
        assert!(err.to_string().contains("unknown option 'colour'"));
    }

    #[test]
    fn test_resolve_rejects_wrong_kind() {
        let err = Settings::new()
            .with("common_super_class", "yes")
            .resolve(&schema(), "python")
            .unwrap_err();
        assert!(err.to_string().contains("expects a bool"));
    }

    #[test]
    fn test_resolve_conditional_requirement() {
        let err = Settings::new()
            .with("common_super_class", true)
            .resolve(&schema(), "python")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("super_class_name"));

        let resolved = Settings::new()
            .with("common_super_class", true)
            .with("super_class_name", "Base")
            .resolve(&schema(), "python")
            .unwrap();
        assert_eq!(resolved.string("super_class_name"), "Base");
    }

    #[test]
    fn test_mandatory_option_without_default() {
        let schema = vec![OptionSpec {
            default: None,
            ..OptionSpec::text("root", "", "Input root")
        }];
        assert!(Settings::new().resolve(&schema, "provider").is_err());
        assert!(Settings::new().with("root", "/tmp").resolve(&schema, "provider").is_ok());
    }

    #[test]
    fn test_settings_from_toml_table() {
        let settings: Settings = toml::from_str("namespace = \"Game.Net\"\npartial_class = true\n").unwrap();
        assert_eq!(settings.string("namespace"), "Game.Net");
        assert!(settings.bool("partial_class"));
        assert!(toml::from_str::<Settings>("depth = 3\n").is_err());
    }

    #[test]
    fn test_schema_serializes_to_json() {
        let json = serde_json::to_string(&schema()).unwrap();
        assert!(json.contains("\"key\":\"super_class_name\""));
        assert!(json.contains("\"required_when\":\"common_super_class\""));
        assert!(json.contains("\"kind\":\"bool\""));
    }
}
