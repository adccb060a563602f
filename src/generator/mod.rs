//! Code generation pipeline
//!
//! A [`Generator`] turns a selection of messages into one [`GeneratedFile`] per
//! message. Every call to [`Generator::generate`] builds a fresh
//! [`GenerationRun`], which remembers the ids it has already rendered and
//! pulls in the messages a selected message depends on, even when those were
//! not selected themselves.
//!
//! Targets only implement [`Backend::render`]; the recursion, memoization and
//! missing-dependency bookkeeping live here.

pub mod csharp;
pub mod msgfile;
pub mod python;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::model::{Field, Message, MessageDatabase};
use crate::options::{OptionSpec, Settings};
use crate::parser::is_primitive;
use crate::template::Template;
use crate::writer::OutputWriter;
use crate::Result;

pub use csharp::CSharpGenerator;
pub use msgfile::MsgFileGenerator;
pub use python::PythonGenerator;

/// A target language
pub trait Generator {
    /// Registry key, also the settings table name in the config file
    fn name(&self) -> &'static str;

    /// Human readable target description
    fn language(&self) -> &'static str;

    /// Configuration schema
    fn options(&self) -> Vec<OptionSpec>;

    /// Render `selection` and everything it depends on
    fn generate<'a>(
        &self,
        db: &'a MessageDatabase,
        selection: &[&'a Message],
        settings: &Settings,
    ) -> Result<GenerationOutput>;
}

/// Per-message rendering of a target
pub trait Backend {
    /// Render one message. Dependencies are generated through `run`.
    fn render<'a>(&self, run: &mut GenerationRun<'a>, message: &'a Message) -> Result<GeneratedFile>;

    /// Ids that are considered generated once `message` is rendered
    fn covers(&self, message: &Message) -> Vec<String> {
        vec![message.id()]
    }
}

/// One output compilation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Id of the message it was generated for
    pub id: String,
    /// Directories below the target subdir
    pub directory: Vec<String>,
    pub file_name: String,
    pub source: String,
}

/// A field type that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MissingDependency {
    /// Id of the message declaring the field
    pub message: String,
    pub ty: String,
}

/// Result of one generator run
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// Directory below the output root, e.g. `pytide`
    pub subdir: &'static str,
    /// File created in every package directory when absent
    pub package_marker: Option<&'static str>,
    pub files: Vec<GeneratedFile>,
    pub missing: Vec<MissingDependency>,
}

impl GenerationOutput {
    pub fn file(&self, id: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Persist every file below `base`
    pub fn write_out_files(&self, base: &Path) -> Result<Vec<PathBuf>> {
        let writer = OutputWriter::new(base.join(self.subdir), self.package_marker);
        let mut written = Vec::with_capacity(self.files.len());
        for file in &self.files {
            written.push(writer.write(file)?);
        }
        info!("Wrote {} files to {}", written.len(), base.join(self.subdir).display());
        Ok(written)
    }
}

/// How a field's type is handled by the serializers
#[derive(Debug, Clone, Copy)]
pub enum FieldType<'a> {
    /// A scalar with a direct put/get pair
    Primitive,
    /// Two unsigned 32-bit words
    Time,
    /// Two signed 32-bit words
    Duration,
    /// A nested message, `None` when unresolved
    Message(Option<&'a Message>),
}

/// A non-primitive type referenced by a message
#[derive(Debug, Clone)]
pub enum Dependency<'a> {
    Resolved(&'a Message),
    Missing(String),
}

/// State of a single generation run
pub struct GenerationRun<'a> {
    db: &'a MessageDatabase,
    settings: Settings,
    generated: BTreeSet<String>,
    files: BTreeMap<String, GeneratedFile>,
    missing: BTreeSet<MissingDependency>,
}

impl<'a> GenerationRun<'a> {
    /// `settings` must already be resolved against the target's schema
    pub fn new(db: &'a MessageDatabase, settings: Settings) -> Self {
        Self {
            db,
            settings,
            generated: BTreeSet::new(),
            files: BTreeMap::new(),
            missing: BTreeSet::new(),
        }
    }

    pub fn db(&self) -> &'a MessageDatabase {
        self.db
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_generated(&self, id: &str) -> bool {
        self.generated.contains(id)
    }

    /// Number of ids marked as generated so far
    pub fn generated_count(&self) -> usize {
        self.generated.len()
    }

    /// Render `message` unless it was already rendered in this run
    pub fn generate_file<B: Backend + ?Sized>(&mut self, backend: &B, message: &'a Message) -> Result<()> {
        let id = message.id();
        if self.generated.contains(&id) {
            return Ok(());
        }
        // marked before rendering so cyclic references terminate
        self.generated.extend(backend.covers(message));

        debug!("Generating {}", id);
        let file = backend.render(self, message)?;
        self.files.insert(id, file);
        Ok(())
    }

    /// Resolve and generate every message type `message` references.
    ///
    /// Types are visited once each, in field order. A message referenced both
    /// bare and package-qualified is listed once.
    pub fn dependencies<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        message: &'a Message,
    ) -> Result<Vec<Dependency<'a>>> {
        let mut seen = BTreeSet::new();
        let mut resolved = BTreeSet::new();
        let mut dependencies = Vec::new();

        for field in &message.fields {
            if is_primitive(&field.ty) || !seen.insert(field.ty.as_str()) {
                continue;
            }
            match self.db.resolve(message, &field.ty) {
                Some(dependency) => {
                    if !resolved.insert(dependency.id()) {
                        continue;
                    }
                    self.generate_file(backend, dependency)?;
                    dependencies.push(Dependency::Resolved(dependency));
                }
                None => {
                    self.record_missing(message, &field.ty);
                    dependencies.push(Dependency::Missing(field.ty.clone()));
                }
            }
        }

        Ok(dependencies)
    }

    /// Classify a field of `owner` for serializer synthesis
    pub fn field_type(&self, owner: &Message, field: &Field) -> FieldType<'a> {
        match field.ty.as_str() {
            "time" => FieldType::Time,
            "duration" => FieldType::Duration,
            ty if is_primitive(ty) => FieldType::Primitive,
            ty => FieldType::Message(self.db.resolve(owner, ty)),
        }
    }

    fn record_missing(&mut self, message: &Message, ty: &str) {
        let missing = MissingDependency {
            message: message.id(),
            ty: ty.to_string(),
        };
        if self.missing.insert(missing) {
            warn!("Missing dependency for type {} in {}", ty, message.id());
        }
    }

    pub fn finish(self, subdir: &'static str, package_marker: Option<&'static str>) -> GenerationOutput {
        GenerationOutput {
            subdir,
            package_marker,
            files: self.files.into_values().collect(),
            missing: self.missing.into_iter().collect(),
        }
    }
}

/// Last segment of a type reference, used when a type does not resolve
pub fn bare_type_name(ty: &str) -> &str {
    ty.rsplit('/').next().unwrap_or(ty)
}

/// Split a dotted option value into path segments, dropping empty ones
pub fn dotted_segments(value: &str) -> Vec<String> {
    value
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Quote a string with the escapes the schema grammar understands
pub fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{8}' => quoted.push_str("\\b"),
            '\u{c}' => quoted.push_str("\\f"),
            c if (c as u32) < 0x20 => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Built-in templates of a target, optionally overridden from disk
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: BTreeMap<&'static str, Template>,
}

impl TemplateSet {
    /// Load `builtin` templates, replacing each with
    /// `<base>/<target>/<name>.template` when that file exists.
    pub fn load(base: Option<&Path>, target: &str, builtin: &[(&'static str, &'static str)]) -> Result<Self> {
        let mut templates = BTreeMap::new();
        for &(name, source) in builtin {
            let template = match base.map(|b| b.join(target).join(format!("{}.template", name))) {
                Some(path) if path.is_file() => {
                    debug!("Using template override {}", path.display());
                    Template::new(std::fs::read_to_string(&path)?)
                }
                _ => Template::new(source),
            };
            templates.insert(name, template);
        }
        Ok(Self { templates })
    }

    pub fn render(&self, name: &str, vars: &[(&str, String)]) -> Result<String> {
        self.templates
            .get(name)
            .ok_or_else(|| crate::Error::Template(format!("no template named '{}'", name)))?
            .substitute(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        calls: std::cell::Cell<usize>,
    }

    impl Backend for Recorder {
        fn render<'a>(&self, run: &mut GenerationRun<'a>, message: &'a Message) -> Result<GeneratedFile> {
            self.calls.set(self.calls.get() + 1);
            let deps = run.dependencies(self, message)?;
            Ok(GeneratedFile {
                id: message.id(),
                directory: message.package.clone(),
                file_name: message.name.clone(),
                source: format!("{} deps", deps.len()),
            })
        }
    }

    fn database() -> MessageDatabase {
        let mut db = MessageDatabase::new();
        db.insert(Message::new(vec!["geo".into()], "Point", vec![Field::new("float64", "x")]));
        db.insert(Message::new(
            vec!["geo".into()],
            "Polygon",
            vec![
                Field::new("Point", "points").with_array(crate::model::ArrayKind::Dynamic),
                Field::new("geo/Point", "center"),
                Field::new("Missing", "extra"),
            ],
        ));
        db
    }

    #[test]
    fn test_generate_file_is_idempotent() {
        let db = database();
        let backend = Recorder { calls: std::cell::Cell::new(0) };
        let mut run = GenerationRun::new(&db, Settings::new());
        let polygon = db.get("geo/Polygon").unwrap();

        run.generate_file(&backend, polygon).unwrap();
        assert_eq!(run.generated_count(), 2);
        assert_eq!(backend.calls.get(), 2);

        run.generate_file(&backend, polygon).unwrap();
        run.generate_file(&backend, db.get("geo/Point").unwrap()).unwrap();
        assert_eq!(run.generated_count(), 2);
        assert_eq!(backend.calls.get(), 2);

        let output = run.finish("out", None);
        assert_eq!(output.files.len(), 2);
        assert_eq!(output.file("geo/Polygon").unwrap().source, "2 deps");
    }

    #[test]
    fn test_cyclic_references_terminate() {
        let mut db = MessageDatabase::new();
        db.insert(Message::new(vec!["loop".into()], "A", vec![Field::new("B", "b")]));
        db.insert(Message::new(
            vec!["loop".into()],
            "B",
            vec![Field::new("A", "a").with_array(crate::model::ArrayKind::Dynamic)],
        ));
        let backend = Recorder { calls: std::cell::Cell::new(0) };
        let mut run = GenerationRun::new(&db, Settings::new());

        run.generate_file(&backend, db.get("loop/A").unwrap()).unwrap();
        assert_eq!(backend.calls.get(), 2);

        let output = run.finish("out", None);
        assert_eq!(output.files.len(), 2);
        assert_eq!(output.file("loop/A").unwrap().source, "1 deps");
        assert_eq!(output.file("loop/B").unwrap().source, "1 deps");
        assert!(output.missing.is_empty());
    }

    #[test]
    fn test_missing_dependency_recorded_once() {
        let db = database();
        let backend = Recorder { calls: std::cell::Cell::new(0) };
        let mut run = GenerationRun::new(&db, Settings::new());
        let polygon = db.get("geo/Polygon").unwrap();

        let deps = run.dependencies(&backend, polygon).unwrap();
        run.dependencies(&backend, polygon).unwrap();

        assert_eq!(deps.len(), 2);
        assert!(matches!(deps[0], Dependency::Resolved(m) if m.id() == "geo/Point"));
        assert!(matches!(deps[1], Dependency::Missing(ref ty) if ty == "Missing"));
        let output = run.finish("out", None);
        assert_eq!(
            output.missing,
            vec![MissingDependency {
                message: "geo/Polygon".into(),
                ty: "Missing".into()
            }]
        );
    }

    #[test]
    fn test_field_type_classification() {
        let db = database();
        let run = GenerationRun::new(&db, Settings::new());
        let polygon = db.get("geo/Polygon").unwrap();

        assert!(matches!(run.field_type(polygon, &Field::new("int32", "a")), FieldType::Primitive));
        assert!(matches!(run.field_type(polygon, &Field::new("time", "t")), FieldType::Time));
        assert!(matches!(run.field_type(polygon, &Field::new("duration", "d")), FieldType::Duration));
        assert!(matches!(run.field_type(polygon, &Field::new("Point", "p")), FieldType::Message(Some(_))));
        assert!(matches!(run.field_type(polygon, &Field::new("Nope", "n")), FieldType::Message(None)));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(bare_type_name("geo/Point"), "Point");
        assert_eq!(bare_type_name("Point"), "Point");
        assert_eq!(dotted_segments("com..example. app"), vec!["com", "example", "app"]);
        assert!(dotted_segments("").is_empty());
        assert_eq!(quote_string("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
    }

    #[test]
    fn test_template_override_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("python")).unwrap();
        std::fs::write(dir.path().join("python/greeting.template"), "hey $who").unwrap();

        let builtin = [("greeting", "hello $who"), ("farewell", "bye $who")];
        let set = TemplateSet::load(Some(dir.path()), "python", &builtin).unwrap();
        let vars = [("who", "you".to_string())];
        assert_eq!(set.render("greeting", &vars).unwrap(), "hey you");
        assert_eq!(set.render("farewell", &vars).unwrap(), "bye you");
        assert!(set.render("missing", &vars).is_err());

        let set = TemplateSet::load(None, "python", &builtin).unwrap();
        assert_eq!(set.render("greeting", &vars).unwrap(), "hello you");
    }
}
