//! Python 3 data classes for the pytide runtime
//!
//! One module per message, named after the lower-cased message name and
//! placed in a package tree mirroring `base_package` and the message package.
//! Every package directory gets an `__init__.py`.

use std::path::PathBuf;

use tracing::info;

use super::{
    bare_type_name, dotted_segments, quote_string, Backend, Dependency, FieldType, GeneratedFile, GenerationOutput,
    GenerationRun, Generator, TemplateSet,
};
use crate::model::{ArrayKind, ConstantValue, Field, Message, MessageDatabase};
use crate::options::{OptionSpec, Settings};
use crate::{Result, VERSION};

const KEY: &str = "python";
const SUBDIR: &str = "pytide";
const PACKAGE_MARKER: &str = "__init__.py";

const MESSAGE_TEMPLATE: &str = r#"# Generated by tidegen v$version
# Source: $msg_id
# Do not edit manually

$dependencies


class $class_name$superclass:
$constants
$constructor
$accessors

    def serializeToMessage(self, message):
        $message_serializer

    def deserializeFromMessage(self, message):
        $message_deserializer
"#;

const DEPENDENCY_TEMPLATE: &str = "from $package import $class";

const CONSTANT_TEMPLATE: &str = "    $name: $type = $value";

const CONSTRUCTOR_TEMPLATE: &str = r#"    def __init__($args):
        $content
"#;

const ACCESSOR_TEMPLATE: &str = r#"
    def get$name(self) -> $type:
        return self.$variable

    def set$name(self, value: $type):
        self.$variable = value
"#;

const TEMPLATES: &[(&str, &str)] = &[
    ("message", MESSAGE_TEMPLATE),
    ("dependency", DEPENDENCY_TEMPLATE),
    ("constant", CONSTANT_TEMPLATE),
    ("constructor", CONSTRUCTOR_TEMPLATE),
    ("accessor", ACCESSOR_TEMPLATE),
];

/// Body indentation inside a method
const BODY_INDENT: &str = "\n        ";

fn primitive_type(ty: &str) -> &'static str {
    match ty {
        "bool" => "bool",
        "float32" | "float64" => "float",
        "string" => "str",
        "time" | "duration" => "Tuple[int, int]",
        _ => "int",
    }
}

fn primitive_default(ty: &str) -> &'static str {
    match ty {
        "bool" => "False",
        "string" => "''",
        "time" | "duration" => "(0, 0)",
        _ => "0",
    }
}

/// Name stem of the pytide `put*`/`get*` calls
fn wire_name(ty: &str) -> &'static str {
    match ty {
        "bool" => "Bool",
        "int8" => "Int8",
        "uint8" => "UInt8",
        "int16" => "Int16",
        "uint16" => "UInt16",
        "int32" => "Int32",
        "uint32" => "UInt32",
        "int64" => "Int64",
        "uint64" => "UInt64",
        "float32" => "Float",
        "float64" => "Double",
        _ => "String",
    }
}

fn python_literal(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Bool(true) => "True".to_string(),
        ConstantValue::Bool(false) => "False".to_string(),
        ConstantValue::String(s) => quote_string(s),
        other => other.to_string(),
    }
}

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue", "def",
    "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Keywords get a trailing underscore, `from` becomes `from_`
fn sanitize(name: &str) -> String {
    if PYTHON_KEYWORDS.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Python 3 target
#[derive(Debug, Clone, Default)]
pub struct PythonGenerator {
    templates: Option<PathBuf>,
}

impl PythonGenerator {
    /// `templates` is the base directory searched for `python/<name>.template` overrides
    pub fn new(templates: Option<PathBuf>) -> Self {
        Self { templates }
    }
}

impl Generator for PythonGenerator {
    fn name(&self) -> &'static str {
        KEY
    }

    fn language(&self) -> &'static str {
        "Python 3 (pytide)"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::text("base_package", "", "Dotted package prefix for all generated modules"),
            OptionSpec::flag("common_super_class", false, "Derive every message class from one super class"),
            OptionSpec::text_required_when(
                "super_class_package",
                "common_super_class",
                "Module the super class is imported from",
            ),
            OptionSpec::text_required_when("super_class_name", "common_super_class", "Name of the super class"),
        ]
    }

    fn generate<'a>(
        &self,
        db: &'a MessageDatabase,
        selection: &[&'a Message],
        settings: &Settings,
    ) -> Result<GenerationOutput> {
        let settings = settings.resolve(&self.options(), KEY)?;
        let backend = PythonBackend {
            templates: TemplateSet::load(self.templates.as_deref(), KEY, TEMPLATES)?,
            base_package: dotted_segments(settings.string("base_package")),
            super_class: settings.bool("common_super_class").then(|| {
                (
                    settings.string("super_class_package").to_string(),
                    settings.string("super_class_name").to_string(),
                )
            }),
        };

        let mut run = GenerationRun::new(db, settings);
        for &message in selection {
            run.generate_file(&backend, message)?;
        }

        let output = run.finish(SUBDIR, Some(PACKAGE_MARKER));
        info!(
            "Generated {} Python modules ({} selected, {} missing types)",
            output.files.len(),
            selection.len(),
            output.missing.len()
        );
        Ok(output)
    }
}

struct PythonBackend {
    templates: TemplateSet,
    base_package: Vec<String>,
    /// (module, class)
    super_class: Option<(String, String)>,
}

impl PythonBackend {
    fn module_path(&self, message: &Message) -> String {
        let mut segments = self.base_package.clone();
        segments.extend(message.package.iter().cloned());
        segments.push(message.name.to_lowercase());
        segments.join(".")
    }

    /// Element type of a field, without the `List[...]` wrapper
    fn element_type(&self, run: &GenerationRun<'_>, owner: &Message, field: &Field) -> String {
        match run.field_type(owner, field) {
            FieldType::Message(Some(dependency)) => dependency.name.clone(),
            FieldType::Message(None) => bare_type_name(&field.ty).to_string(),
            _ => primitive_type(&field.ty).to_string(),
        }
    }

    fn field_type(&self, run: &GenerationRun<'_>, owner: &Message, field: &Field) -> String {
        let element = self.element_type(run, owner, field);
        if field.is_array() {
            format!("List[{}]", element)
        } else {
            element
        }
    }

    fn dependencies(&self, message: &Message, dependencies: &[Dependency<'_>]) -> Result<String> {
        let uses_tuple = message.fields.iter().any(|f| f.ty == "time" || f.ty == "duration");
        let mut imports = vec![if uses_tuple {
            "from typing import Tuple, List".to_string()
        } else {
            "from typing import List".to_string()
        }];

        for dependency in dependencies {
            match dependency {
                Dependency::Resolved(dep) => imports.push(self.templates.render(
                    "dependency",
                    &[("package", self.module_path(dep)), ("class", dep.name.clone())],
                )?),
                Dependency::Missing(ty) => imports.push(format!("# MISSING TYPE: {}", ty)),
            }
        }

        if let Some((package, name)) = &self.super_class {
            imports.push(format!("from {} import {}", package, name));
        }

        Ok(imports.join("\n"))
    }

    fn constants(&self, message: &Message) -> Result<String> {
        let mut constants = Vec::new();
        for field in message.constant_fields() {
            if let Some(value) = &field.constant {
                constants.push(self.templates.render(
                    "constant",
                    &[
                        ("name", sanitize(&field.name)),
                        ("type", primitive_type(&field.ty).to_string()),
                        ("value", python_literal(value)),
                    ],
                )?);
            }
        }
        Ok(constants.join("\n"))
    }

    fn constructor(&self, run: &GenerationRun<'_>, message: &Message) -> Result<String> {
        let mut args = vec!["self".to_string()];
        let mut content = Vec::new();

        if self.super_class.is_some() {
            content.push("super().__init__()".to_string());
        }

        for field in message.instance_fields() {
            let ty = self.field_type(run, message, field);
            let name = &sanitize(&field.name);

            if field.is_array() {
                args.push(format!("{}: {} = None", name, ty));
                content.push(format!("self.{}: {} = {} if {} is not None else []", name, ty, name, name));
            } else if let FieldType::Message(_) = run.field_type(message, field) {
                args.push(format!("{}: {} = None", name, ty));
                content.push(format!("self.{}: {} = {} if {} is not None else {}()", name, ty, name, name, ty));
            } else {
                args.push(format!("{}: {} = {}", name, ty, primitive_default(&field.ty)));
                content.push(format!("self.{}: {} = {}", name, ty, name));
            }
        }

        if content.is_empty() {
            content.push("pass".to_string());
        }

        self.templates.render(
            "constructor",
            &[
                ("args", args.join(", ")),
                ("classname", message.name.clone()),
                ("content", content.join(BODY_INDENT)),
                ("msgID", message.id()),
            ],
        )
    }

    fn accessors(&self, run: &GenerationRun<'_>, message: &Message) -> Result<String> {
        let mut accessors = Vec::new();
        for field in message.instance_fields() {
            accessors.push(self.templates.render(
                "accessor",
                &[
                    ("name", capitalize(&field.name)),
                    ("type", self.field_type(run, message, field)),
                    ("variable", sanitize(&field.name)),
                ],
            )?);
        }
        Ok(accessors.join(""))
    }

    fn serializers(&self, run: &GenerationRun<'_>, message: &Message) -> String {
        let mut lines = Vec::new();

        for field in message.instance_fields() {
            let name = &sanitize(&field.name);
            let kind = run.field_type(message, field);

            match (field.array, kind) {
                (None, FieldType::Primitive) => {
                    lines.push(format!("message.put{}(self.{})", wire_name(&field.ty), name));
                }
                (None, FieldType::Time) => {
                    lines.push(format!("message.putUInt32(self.{}[0])", name));
                    lines.push(format!("message.putUInt32(self.{}[1])", name));
                }
                (None, FieldType::Duration) => {
                    lines.push(format!("message.putInt32(self.{}[0])", name));
                    lines.push(format!("message.putInt32(self.{}[1])", name));
                }
                (None, FieldType::Message(_)) => {
                    lines.push(format!("self.{}.serializeToMessage(message)", name));
                }
                (Some(ArrayKind::Dynamic), FieldType::Primitive) => {
                    lines.push(format!("message.put{}Array(self.{})", wire_name(&field.ty), name));
                }
                (Some(ArrayKind::Fixed(_)), FieldType::Primitive) => {
                    lines.push(format!(
                        "message.put{}Array(self.{}, includeLength=False)",
                        wire_name(&field.ty),
                        name
                    ));
                }
                (Some(array), kind) => {
                    let count = match array {
                        ArrayKind::Dynamic => {
                            lines.push(format!("message.putVarULong(len(self.{}))", name));
                            format!("len(self.{})", name)
                        }
                        ArrayKind::Fixed(n) => n.to_string(),
                    };
                    lines.push(format!("for i in range({}):", count));
                    match kind {
                        FieldType::Time => {
                            lines.push(format!("    message.putUInt32(self.{}[i][0])", name));
                            lines.push(format!("    message.putUInt32(self.{}[i][1])", name));
                        }
                        FieldType::Duration => {
                            lines.push(format!("    message.putInt32(self.{}[i][0])", name));
                            lines.push(format!("    message.putInt32(self.{}[i][1])", name));
                        }
                        _ => lines.push(format!("    self.{}[i].serializeToMessage(message)", name)),
                    }
                }
            }
        }

        if lines.is_empty() {
            return "pass".to_string();
        }
        lines.join(BODY_INDENT)
    }

    fn deserializers(&self, run: &GenerationRun<'_>, message: &Message) -> String {
        let mut lines = Vec::new();

        for field in message.instance_fields() {
            let name = &sanitize(&field.name);
            let kind = run.field_type(message, field);
            let element = self.element_type(run, message, field);

            match (field.array, kind) {
                (None, FieldType::Primitive) => {
                    lines.push(format!("self.{} = message.get{}()", name, wire_name(&field.ty)));
                }
                (None, FieldType::Time) => {
                    lines.push(format!("self.{} = (message.getUInt32(), message.getUInt32())", name));
                }
                (None, FieldType::Duration) => {
                    lines.push(format!("self.{} = (message.getInt32(), message.getInt32())", name));
                }
                (None, FieldType::Message(_)) => {
                    lines.push(format!("self.{} = {}()", name, element));
                    lines.push(format!("self.{}.deserializeFromMessage(message)", name));
                }
                (Some(ArrayKind::Dynamic), FieldType::Primitive) => {
                    lines.push(format!("self.{} = message.get{}Array()", name, wire_name(&field.ty)));
                }
                (Some(ArrayKind::Fixed(n)), FieldType::Primitive) => {
                    lines.push(format!("self.{} = message.get{}Array(length={})", name, wire_name(&field.ty), n));
                }
                (Some(array), kind) => {
                    let count = match array {
                        ArrayKind::Dynamic => {
                            lines.push("length = message.getVarULong()".to_string());
                            "length".to_string()
                        }
                        ArrayKind::Fixed(n) => n.to_string(),
                    };
                    lines.push(format!("self.{} = []", name));
                    lines.push(format!("for i in range({}):", count));
                    match kind {
                        FieldType::Time => lines.push(format!(
                            "    self.{}.append((message.getUInt32(), message.getUInt32()))",
                            name
                        )),
                        FieldType::Duration => lines.push(format!(
                            "    self.{}.append((message.getInt32(), message.getInt32()))",
                            name
                        )),
                        _ => {
                            lines.push(format!("    value: {} = {}()", element, element));
                            lines.push("    value.deserializeFromMessage(message)".to_string());
                            lines.push(format!("    self.{}.append(value)", name));
                        }
                    }
                }
            }
        }

        if lines.is_empty() {
            return "pass".to_string();
        }
        lines.join(BODY_INDENT)
    }
}

impl Backend for PythonBackend {
    fn render<'a>(&self, run: &mut GenerationRun<'a>, message: &'a Message) -> Result<GeneratedFile> {
        let dependencies = run.dependencies(self, message)?;

        let superclass = match &self.super_class {
            Some((_, name)) => format!("({})", name),
            None => String::new(),
        };

        let source = self.templates.render(
            "message",
            &[
                ("version", VERSION.to_string()),
                ("msg_id", message.id()),
                ("dependencies", self.dependencies(message, &dependencies)?),
                ("class_name", message.name.clone()),
                ("superclass", superclass),
                ("constants", self.constants(message)?),
                ("constructor", self.constructor(run, message)?),
                ("accessors", self.accessors(run, message)?),
                ("message_serializer", self.serializers(run, message)),
                ("message_deserializer", self.deserializers(run, message)),
            ],
        )?;

        let mut directory = self.base_package.clone();
        directory.extend(message.package.iter().cloned());

        Ok(GeneratedFile {
            id: message.id(),
            directory,
            file_name: format!("{}.py", message.name.to_lowercase()),
            source,
        })
    }
}
