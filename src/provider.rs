//! Data providers: where messages come from
//!
//! The built-in [`MsgFileProvider`] reads `.msg` / `.srv` files laid out the
//! ROS way, `<package>/msg/<Name>.msg` and `<package>/srv/<Name>.srv` (the
//! plural folder names `msgs` / `srvs` are accepted too).

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::model::MessageDatabase;
use crate::options::{OptionSpec, Settings};
use crate::parser::{MessageParser, UnitKind};
use crate::{Error, Result};

/// A source of messages
pub trait DataProvider {
    /// Registry key
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Configuration schema
    fn options(&self) -> Vec<OptionSpec>;

    /// Load every input into a fresh message database
    fn load(&self, inputs: &[PathBuf], settings: &Settings) -> Result<LoadReport>;
}

/// One schema definition ready to be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputUnit {
    pub package: Vec<String>,
    pub name: String,
    pub kind: UnitKind,
    pub source: String,
    /// Where the text came from, for diagnostics
    pub origin: String,
}

impl InputUnit {
    pub fn message(package: &str, name: &str, source: &str) -> Self {
        Self::new(package, name, UnitKind::Message, source)
    }

    pub fn service(package: &str, name: &str, source: &str) -> Self {
        Self::new(package, name, UnitKind::Service, source)
    }

    fn new(package: &str, name: &str, kind: UnitKind, source: &str) -> Self {
        Self {
            package: package.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect(),
            name: name.to_string(),
            kind,
            source: source.to_string(),
            origin: format!("{}/{}", package, name),
        }
    }
}

/// Package, name and kind derived from a unit's path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPath {
    pub package: String,
    pub name: String,
    pub kind: UnitKind,
}

impl UnitPath {
    /// Classify `<package>/msg[s]/<Name>.msg` or `<package>/srv[s]/<Name>.srv`
    pub fn classify(path: &Path) -> Option<Self> {
        let kind = match path.extension()?.to_str()? {
            "msg" => UnitKind::Message,
            "srv" => UnitKind::Service,
            _ => return None,
        };
        let name = path.file_stem()?.to_str()?;
        let folder = path.parent()?;
        let expected = match kind {
            UnitKind::Message => ["msg", "msgs"],
            UnitKind::Service => ["srv", "srvs"],
        };
        if !expected.contains(&folder.file_name()?.to_str()?) {
            return None;
        }
        let package = folder.parent()?.file_name()?.to_str()?;

        if name.is_empty() || package.is_empty() {
            return None;
        }
        Some(Self {
            package: package.to_string(),
            name: name.to_string(),
            kind,
        })
    }
}

/// A unit that failed to load
#[derive(Debug)]
pub struct LoadFailure {
    pub origin: String,
    pub error: Error,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin, self.error)
    }
}

/// Outcome of a provider load
#[derive(Debug, Default)]
pub struct LoadReport {
    pub database: MessageDatabase,
    pub failures: Vec<LoadFailure>,
    /// Ids dropped because an earlier unit already defined them
    pub duplicates: Vec<String>,
    /// Inputs that do not look like schema units
    pub skipped: Vec<PathBuf>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Provider for `.msg` / `.srv` files
#[derive(Debug, Clone, Default)]
pub struct MsgFileProvider;

impl MsgFileProvider {
    pub fn new() -> Self {
        Self
    }

    /// Parse in-memory units into a fresh database.
    ///
    /// With `strict` the first failure is returned as an error; otherwise it is
    /// recorded and loading continues.
    pub fn load_units(&self, units: Vec<InputUnit>, strict: bool) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let mut parser = MessageParser::new();

        for unit in &units {
            parser.register_type(&unit.package, &unit.name);
        }

        for unit in units {
            debug!("Parsing {}", unit.origin);
            let parsed = match parser.parse_unit(unit.kind, &unit.package, &unit.name, &unit.source) {
                Ok(parsed) => parsed,
                Err(err) if strict => return Err(err.into()),
                Err(err) => {
                    warn!("Failed to parse {}: {}", unit.origin, err);
                    report.failures.push(LoadFailure {
                        origin: unit.origin,
                        error: err.into(),
                    });
                    continue;
                }
            };

            for message in parsed.into_messages() {
                let id = message.id();
                if !report.database.insert(message) {
                    report.duplicates.push(id);
                }
            }
        }

        info!(
            "Loaded {} messages ({} failures, {} duplicates)",
            report.database.len(),
            report.failures.len(),
            report.duplicates.len()
        );
        Ok(report)
    }
}

impl DataProvider for MsgFileProvider {
    fn name(&self) -> &'static str {
        "msg_files"
    }

    fn description(&self) -> &'static str {
        "ROS-style *.msg / *.srv files"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::flag(
            "strict",
            false,
            "Abort on the first unit that fails to parse",
        )]
    }

    fn load(&self, inputs: &[PathBuf], settings: &Settings) -> Result<LoadReport> {
        let settings = settings.resolve(&self.options(), self.name())?;
        let strict = settings.bool("strict");

        let mut units = Vec::new();
        let mut skipped = Vec::new();
        let mut failures = Vec::new();

        for path in inputs {
            let Some(unit_path) = UnitPath::classify(path) else {
                warn!(
                    "Skipping {}: expected <package>/msg/<Name>.msg or <package>/srv/<Name>.srv",
                    path.display()
                );
                skipped.push(path.clone());
                continue;
            };

            match std::fs::read_to_string(path) {
                Ok(source) => units.push(InputUnit {
                    origin: path.display().to_string(),
                    ..InputUnit::new(&unit_path.package, &unit_path.name, unit_path.kind, &source)
                }),
                Err(err) if strict => return Err(err.into()),
                Err(err) => {
                    warn!("Failed to read {}: {}", path.display(), err);
                    failures.push(LoadFailure {
                        origin: path.display().to_string(),
                        error: err.into(),
                    });
                }
            }
        }

        let mut report = self.load_units(units, strict)?;
        report.skipped = skipped;
        failures.append(&mut report.failures);
        report.failures = failures;
        Ok(report)
    }
}
