//! C# classes for the Riptide networking library
//!
//! Each message becomes `<Name>Message` in a namespace built from the
//! `namespace` option and the message package, with `serializeToMessage` /
//! `deserializeFromMessage` methods over a `Riptide.Message`.

use std::path::PathBuf;

use tracing::info;

use super::{
    bare_type_name, dotted_segments, quote_string, Backend, Dependency, FieldType, GeneratedFile, GenerationOutput,
    GenerationRun, Generator, TemplateSet,
};
use crate::model::{ArrayKind, ConstantValue, Field, Message, MessageDatabase};
use crate::options::{OptionSpec, Settings};
use crate::{Result, VERSION};

const KEY: &str = "csharp";
const SUBDIR: &str = "riptide";

const MESSAGE_TEMPLATE: &str = r#"// Generated by tidegen v$version
// Source: $msg_id
// Do not edit manually

using System.Collections.Generic;
using Riptide;
$dependencies

$namespace_open
    public${class_keywords} class $class_name$superclass
    {
        $constants

        $fields

$constructor

        public void serializeToMessage(Message message)
        {
            $message_serializer
        }

        public void deserializeFromMessage(Message message)
        {
            $message_deserializer
        }

        private static void AddArrayLength(Message message, int length)
        {
            message.AddVarULong((ulong)length);
        }

        private static int ReadArrayLength(Message message)
        {
            return (int)message.GetVarULong();
        }
    }
$namespace_close
"#;

const DEPENDENCY_TEMPLATE: &str = "using $package;";

const CONSTANT_TEMPLATE: &str = "public const $type $name = $value;";

const FIELD_TEMPLATE: &str = "public $type $name;";

const CONSTRUCTOR_TEMPLATE: &str = r#"        public $classname($args)
        {
            $content
        }"#;

const TEMPLATES: &[(&str, &str)] = &[
    ("message", MESSAGE_TEMPLATE),
    ("dependency", DEPENDENCY_TEMPLATE),
    ("constant", CONSTANT_TEMPLATE),
    ("field", FIELD_TEMPLATE),
    ("constructor", CONSTRUCTOR_TEMPLATE),
];

const MEMBER_INDENT: &str = "\n        ";
const BODY_INDENT: &str = "\n            ";

const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked", "class", "const",
    "continue", "decimal", "default", "delegate", "do", "double", "else", "enum", "event", "explicit", "extern",
    "false", "finally", "fixed", "float", "for", "foreach", "goto", "if", "implicit", "in", "int", "interface",
    "internal", "is", "lock", "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short", "sizeof",
    "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true", "try", "typeof", "uint", "ulong",
    "unchecked", "unsafe", "ushort", "using", "virtual", "void", "volatile", "while",
];

fn primitive_type(ty: &str) -> &'static str {
    match ty {
        "bool" => "bool",
        "int8" => "sbyte",
        "uint8" => "byte",
        "int16" => "short",
        "uint16" => "ushort",
        "int32" => "int",
        "uint32" => "uint",
        "int64" => "long",
        "uint64" => "ulong",
        "float32" => "float",
        "float64" => "double",
        "time" => "uint[]",
        "duration" => "int[]",
        _ => "string",
    }
}

fn primitive_default(ty: &str) -> &'static str {
    match ty {
        "bool" => "false",
        "float32" => "0f",
        "string" => "\"\"",
        "time" | "duration" => "null",
        _ => "0",
    }
}

/// Name stem of the Riptide `Add*`/`Get*` calls
fn wire_name(ty: &str) -> &'static str {
    match ty {
        "bool" => "Bool",
        "int8" => "SByte",
        "uint8" => "Byte",
        "int16" => "Short",
        "uint16" => "UShort",
        "int32" => "Int",
        "uint32" => "UInt",
        "int64" => "Long",
        "uint64" => "ULong",
        "float32" => "Float",
        "float64" => "Double",
        _ => "String",
    }
}

fn csharp_literal(ty: &str, value: &ConstantValue) -> String {
    match value {
        ConstantValue::String(s) => quote_string(s),
        ConstantValue::Float(_) if ty == "float32" => format!("{}f", value),
        other => other.to_string(),
    }
}

fn sanitize(name: &str) -> String {
    if CSHARP_KEYWORDS.contains(&name) {
        format!("_{}", name)
    } else {
        name.to_string()
    }
}

/// C# / Riptide target
#[derive(Debug, Clone, Default)]
pub struct CSharpGenerator {
    templates: Option<PathBuf>,
}

impl CSharpGenerator {
    /// `templates` is the base directory searched for `csharp/<name>.template` overrides
    pub fn new(templates: Option<PathBuf>) -> Self {
        Self { templates }
    }
}

impl Generator for CSharpGenerator {
    fn name(&self) -> &'static str {
        KEY
    }

    fn language(&self) -> &'static str {
        "C# (Riptide)"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::text("namespace", "", "Dotted namespace prefix for all generated classes"),
            OptionSpec::flag("partial_class", false, "Declare generated classes as partial"),
            OptionSpec::flag(
                "flatten_structure",
                false,
                "Write every file directly into the output directory",
            ),
            OptionSpec::flag("common_base", false, "Derive every message class from one base class"),
            OptionSpec::text_required_when(
                "common_base_namespace",
                "common_base",
                "Namespace of the base class",
            ),
            OptionSpec::text_required_when("common_base_class", "common_base", "Name of the base class"),
        ]
    }

    fn generate<'a>(
        &self,
        db: &'a MessageDatabase,
        selection: &[&'a Message],
        settings: &Settings,
    ) -> Result<GenerationOutput> {
        let settings = settings.resolve(&self.options(), KEY)?;
        let backend = CSharpBackend {
            templates: TemplateSet::load(self.templates.as_deref(), KEY, TEMPLATES)?,
            namespace: dotted_segments(settings.string("namespace")),
            partial_class: settings.bool("partial_class"),
            flatten_structure: settings.bool("flatten_structure"),
            common_base: settings.bool("common_base").then(|| {
                (
                    settings.string("common_base_namespace").to_string(),
                    settings.string("common_base_class").to_string(),
                )
            }),
        };

        let mut run = GenerationRun::new(db, settings);
        for &message in selection {
            run.generate_file(&backend, message)?;
        }

        let output = run.finish(SUBDIR, None);
        info!(
            "Generated {} C# classes ({} selected, {} missing types)",
            output.files.len(),
            selection.len(),
            output.missing.len()
        );
        Ok(output)
    }
}

struct CSharpBackend {
    templates: TemplateSet,
    namespace: Vec<String>,
    partial_class: bool,
    flatten_structure: bool,
    /// (namespace, class)
    common_base: Option<(String, String)>,
}

impl CSharpBackend {
    fn namespace_segments(&self, message: &Message) -> Vec<String> {
        let mut segments = self.namespace.clone();
        segments.extend(message.package.iter().cloned());
        segments
    }

    fn class_name(message: &Message) -> String {
        format!("{}Message", message.name)
    }

    fn element_type(&self, run: &GenerationRun<'_>, owner: &Message, field: &Field) -> String {
        match run.field_type(owner, field) {
            FieldType::Message(Some(dependency)) => Self::class_name(dependency),
            FieldType::Message(None) => format!("{}Message", bare_type_name(&field.ty)),
            _ => primitive_type(&field.ty).to_string(),
        }
    }

    fn field_type(&self, run: &GenerationRun<'_>, owner: &Message, field: &Field) -> String {
        let element = self.element_type(run, owner, field);
        match field.array {
            Some(ArrayKind::Dynamic) => format!("List<{}>", element),
            Some(ArrayKind::Fixed(_)) => format!("{}[]", element),
            None => element,
        }
    }

    fn dependencies(&self, dependencies: &[Dependency<'_>]) -> Result<String> {
        let mut imports: Vec<String> = Vec::new();

        for dependency in dependencies {
            let line = match dependency {
                Dependency::Resolved(dep) => {
                    let namespace = self.namespace_segments(dep).join(".");
                    if namespace.is_empty() {
                        continue;
                    }
                    self.templates.render("dependency", &[("package", namespace)])?
                }
                Dependency::Missing(ty) => format!("// MISSING TYPE: {}", ty),
            };
            if !imports.contains(&line) {
                imports.push(line);
            }
        }

        if let Some((namespace, _)) = &self.common_base {
            let line = format!("using {};", namespace);
            if !imports.contains(&line) {
                imports.push(line);
            }
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
                        ("value", csharp_literal(&field.ty, value)),
                    ],
                )?);
            }
        }
        Ok(constants.join(MEMBER_INDENT))
    }

    fn fields(&self, run: &GenerationRun<'_>, message: &Message) -> Result<String> {
        let mut fields = Vec::new();
        for field in message.instance_fields() {
            fields.push(self.templates.render(
                "field",
                &[
                    ("name", sanitize(&field.name)),
                    ("type", self.field_type(run, message, field)),
                ],
            )?);
        }
        Ok(fields.join(MEMBER_INDENT))
    }

    fn constructor(&self, run: &GenerationRun<'_>, message: &Message) -> Result<String> {
        let mut args = Vec::new();
        let mut content = Vec::new();

        for field in message.instance_fields() {
            let name = sanitize(&field.name);
            let ty = self.field_type(run, message, field);
            let default = match (field.array, run.field_type(message, field)) {
                (None, FieldType::Primitive) => primitive_default(&field.ty),
                _ => "null",
            };
            args.push(format!("{} {} = {}", ty, name, default));
            content.push(format!("this.{} = {};", name, name));
        }

        self.templates.render(
            "constructor",
            &[
                ("msgID", message.id()),
                ("args", args.join(", ")),
                ("classname", Self::class_name(message)),
                ("content", content.join(BODY_INDENT)),
            ],
        )
    }

    fn serializers(&self, run: &GenerationRun<'_>, message: &Message) -> String {
        let mut lines = Vec::new();

        for field in message.instance_fields() {
            let name = sanitize(&field.name);
            let kind = run.field_type(message, field);

            match (field.array, kind) {
                (None, FieldType::Primitive) => {
                    lines.push(format!("message.Add{}(this.{});", wire_name(&field.ty), name));
                }
                (None, FieldType::Time) => {
                    lines.push(format!("message.AddUInt(this.{}[0]);", name));
                    lines.push(format!("message.AddUInt(this.{}[1]);", name));
                }
                (None, FieldType::Duration) => {
                    lines.push(format!("message.AddInt(this.{}[0]);", name));
                    lines.push(format!("message.AddInt(this.{}[1]);", name));
                }
                (None, FieldType::Message(_)) => {
                    lines.push(format!("this.{}.serializeToMessage(message);", name));
                }
                (Some(ArrayKind::Dynamic), FieldType::Primitive) => {
                    lines.push(format!("message.Add{}s(this.{}.ToArray());", wire_name(&field.ty), name));
                }
                (Some(ArrayKind::Fixed(_)), FieldType::Primitive) => {
                    lines.push(format!("message.Add{}s(this.{}, false);", wire_name(&field.ty), name));
                }
                (Some(array), kind) => {
                    let count = match array {
                        ArrayKind::Dynamic => {
                            lines.push(format!("AddArrayLength(message, this.{}.Count);", name));
                            format!("this.{}.Count", name)
                        }
                        ArrayKind::Fixed(n) => n.to_string(),
                    };
                    lines.push(format!("for (int i = 0; i < {}; i++) {{", count));
                    match kind {
                        FieldType::Time => {
                            lines.push(format!("    message.AddUInt(this.{}[i][0]);", name));
                            lines.push(format!("    message.AddUInt(this.{}[i][1]);", name));
                        }
                        FieldType::Duration => {
                            lines.push(format!("    message.AddInt(this.{}[i][0]);", name));
                            lines.push(format!("    message.AddInt(this.{}[i][1]);", name));
                        }
                        _ => lines.push(format!("    this.{}[i].serializeToMessage(message);", name)),
                    }
                    lines.push("}".to_string());
                }
            }
        }

        lines.join(BODY_INDENT)
    }

    fn deserializers(&self, run: &GenerationRun<'_>, message: &Message) -> String {
        let mut lines = Vec::new();
        let mut length_declared = false;

        for field in message.instance_fields() {
            let name = sanitize(&field.name);
            let kind = run.field_type(message, field);
            let element = self.element_type(run, message, field);

            match (field.array, kind) {
                (None, FieldType::Primitive) => {
                    lines.push(format!("this.{} = message.Get{}();", name, wire_name(&field.ty)));
                }
                (None, FieldType::Time) => {
                    lines.push(format!("this.{} = new uint[] {{ message.GetUInt(), message.GetUInt() }};", name));
                }
                (None, FieldType::Duration) => {
                    lines.push(format!("this.{} = new int[] {{ message.GetInt(), message.GetInt() }};", name));
                }
                (None, FieldType::Message(_)) => {
                    lines.push(format!("this.{} = new {}();", name, element));
                    lines.push(format!("this.{}.deserializeFromMessage(message);", name));
                }
                (Some(ArrayKind::Dynamic), FieldType::Primitive) => {
                    lines.push(format!(
                        "this.{} = new List<{}>(message.Get{}s());",
                        name,
                        element,
                        wire_name(&field.ty)
                    ));
                }
                (Some(ArrayKind::Fixed(n)), FieldType::Primitive) => {
                    lines.push(format!("this.{} = message.Get{}s({});", name, wire_name(&field.ty), n));
                }
                (Some(ArrayKind::Dynamic), kind) => {
                    lines.push(if length_declared {
                        "length = ReadArrayLength(message);".to_string()
                    } else {
                        "int length = ReadArrayLength(message);".to_string()
                    });
                    length_declared = true;
                    lines.push(format!("this.{} = new List<{}>();", name, element));
                    lines.push("for (int i = 0; i < length; i++) {".to_string());
                    match kind {
                        FieldType::Time => lines.push(format!(
                            "    this.{}.Add(new uint[] {{ message.GetUInt(), message.GetUInt() }});",
                            name
                        )),
                        FieldType::Duration => lines.push(format!(
                            "    this.{}.Add(new int[] {{ message.GetInt(), message.GetInt() }});",
                            name
                        )),
                        _ => {
                            lines.push(format!("    {} value = new {}();", element, element));
                            lines.push("    value.deserializeFromMessage(message);".to_string());
                            lines.push(format!("    this.{}.Add(value);", name));
                        }
                    }
                    lines.push("}".to_string());
                }
                (Some(ArrayKind::Fixed(n)), kind) => {
                    // jagged for time/duration: uint[n][]
                    let allocation = match kind {
                        FieldType::Time => format!("new uint[{}][]", n),
                        FieldType::Duration => format!("new int[{}][]", n),
                        _ => format!("new {}[{}]", element, n),
                    };
                    lines.push(format!("this.{} = {};", name, allocation));
                    lines.push(format!("for (int i = 0; i < {}; i++) {{", n));
                    match kind {
                        FieldType::Time => lines.push(format!(
                            "    this.{}[i] = new uint[] {{ message.GetUInt(), message.GetUInt() }};",
                            name
                        )),
                        FieldType::Duration => lines.push(format!(
                            "    this.{}[i] = new int[] {{ message.GetInt(), message.GetInt() }};",
                            name
                        )),
                        _ => {
                            lines.push(format!("    {} value = new {}();", element, element));
                            lines.push("    value.deserializeFromMessage(message);".to_string());
                            lines.push(format!("    this.{}[i] = value;", name));
                        }
                    }
                    lines.push("}".to_string());
                }
            }
        }

        lines.join(BODY_INDENT)
    }
}

impl Backend for CSharpBackend {
    fn render<'a>(&self, run: &mut GenerationRun<'a>, message: &'a Message) -> Result<GeneratedFile> {
        let dependencies = run.dependencies(self, message)?;

        let namespace = self.namespace_segments(message);
        let (namespace_open, namespace_close) = if namespace.is_empty() {
            (String::new(), String::new())
        } else {
            (format!("namespace {}\n{{", namespace.join(".")), "}".to_string())
        };
        let superclass = match &self.common_base {
            Some((_, class)) => format!(" : {}", class),
            None => String::new(),
        };

        let source = self.templates.render(
            "message",
            &[
                ("version", VERSION.to_string()),
                ("msg_id", message.id()),
                ("dependencies", self.dependencies(&dependencies)?),
                ("namespace_open", namespace_open),
                ("namespace_close", namespace_close),
                ("class_keywords", if self.partial_class { " partial" } else { "" }.to_string()),
                ("class_name", Self::class_name(message)),
                ("superclass", superclass),
                ("constants", self.constants(message)?),
                ("fields", self.fields(run, message)?),
                ("constructor", self.constructor(run, message)?),
                ("message_serializer", self.serializers(run, message)),
                ("message_deserializer", self.deserializers(run, message)),
            ],
        )?;

        Ok(GeneratedFile {
            id: message.id(),
            directory: if self.flatten_structure { Vec::new() } else { namespace },
            file_name: format!("{}.cs", message.name),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MessageParser;

    fn database(units: &[(&str, &str, &str)]) -> MessageDatabase {
        let mut parser = MessageParser::new();
        let mut db = MessageDatabase::new();
        for (package, name, source) in units {
            db.insert(parser.parse_message(&[package.to_string()], name, source).unwrap());
        }
        db
    }

    fn generate(db: &MessageDatabase, id: &str, settings: &Settings) -> GenerationOutput {
        let message = db.get(id).unwrap();
        CSharpGenerator::default().generate(db, &[message], settings).unwrap()
    }

    #[test]
    fn test_simple_message() {
        let db = database(&[("demo", "Sample", "int32 x\nint32[] y\nfloat32 GAIN = 0.5\nstring name = \"hi\"\n")]);
        let output = generate(&db, "demo/Sample", &Settings::new());
        let file = output.file("demo/Sample").unwrap();

        assert_eq!(file.file_name, "Sample.cs");
        assert_eq!(file.directory, vec!["demo"]);
        let source = &file.source;
        assert!(source.contains("using Riptide;"));
        assert!(source.contains("namespace demo\n{"));
        assert!(source.contains("public class SampleMessage"));
        assert!(source.contains("public const float GAIN = 0.5f;"));
        assert!(source.contains("public const string name = \"hi\";"));
        assert!(source.contains("public int x;"));
        assert!(source.contains("public List<int> y;"));
        assert!(source.contains("public SampleMessage(int x = 0, List<int> y = null)"));
        assert!(source.contains("message.AddInt(this.x);"));
        assert!(source.contains("message.AddInts(this.y.ToArray());"));
        assert!(source.contains("this.y = new List<int>(message.GetInts());"));
        assert!(!source.contains("this.GAIN"));
        assert!(!source.contains("this.name"));
    }

    #[test]
    fn test_keywords_are_escaped() {
        let db = database(&[("demo", "Flags", "bool class\nint32 value")]);
        let source = &generate(&db, "demo/Flags", &Settings::new()).files[0].source;

        assert!(source.contains("public bool _class;"));
        assert!(source.contains("message.AddBool(this._class);"));
        assert!(source.contains("public int value;"));
    }

    #[test]
    fn test_nested_and_fixed_arrays() {
        let db = database(&[
            ("geo", "Point", "float64 x"),
            ("geo", "Shape", "Point[] points\nPoint[3] corners\nuint8[4] tag\ntime[2] stamps\nduration[] spans"),
        ]);
        let settings = Settings::new().with("namespace", "Game.Net");
        let output = generate(&db, "geo/Shape", &settings);
        assert_eq!(output.files.len(), 2);

        let shape = output.file("geo/Shape").unwrap();
        assert_eq!(shape.directory, vec!["Game", "Net", "geo"]);
        let source = &shape.source;
        assert!(source.contains("using Game.Net.geo;"));
        assert_eq!(source.matches("using Game.Net.geo;").count(), 1);
        assert!(source.contains("public List<PointMessage> points;"));
        assert!(source.contains("public PointMessage[] corners;"));
        assert!(source.contains("AddArrayLength(message, this.points.Count);"));
        assert!(source.contains("message.AddBytes(this.tag, false);"));
        assert!(source.contains("this.tag = message.GetBytes(4);"));
        assert!(source.contains("int length = ReadArrayLength(message);"));
        assert!(source.contains("length = ReadArrayLength(message);\n"));
        assert!(source.contains("this.corners = new PointMessage[3];"));
        assert!(source.contains("this.stamps = new uint[2][];"));
        assert!(source.contains("this.spans.Add(new int[] { message.GetInt(), message.GetInt() });"));
    }

    #[test]
    fn test_class_options() {
        let db = database(&[("demo", "Ping", "int32 seq")]);
        let settings = Settings::new()
            .with("partial_class", true)
            .with("flatten_structure", true)
            .with("common_base", true)
            .with("common_base_namespace", "Net.Core")
            .with("common_base_class", "MessageBase");
        let file = &generate(&db, "demo/Ping", &settings).files[0];

        assert!(file.directory.is_empty());
        assert!(file.source.contains("using Net.Core;"));
        assert!(file.source.contains("public partial class PingMessage : MessageBase"));
    }

    #[test]
    fn test_missing_type_marker() {
        let db = database(&[("demo", "Broken", "Foo thing")]);
        let output = generate(&db, "demo/Broken", &Settings::new());

        assert!(output.files[0].source.contains("// MISSING TYPE: Foo"));
        assert!(output.files[0].source.contains("public FooMessage thing;"));
        assert_eq!(output.missing.len(), 1);
    }

    #[test]
    fn test_unknown_option_rejected() {
        let db = database(&[("demo", "Ping", "int32 seq")]);
        let message = db.get("demo/Ping").unwrap();
        let settings = Settings::new().with("base_package", "x");

        assert!(CSharpGenerator::default().generate(&db, &[message], &settings).is_err());
    }

    #[test]
    fn test_write_out_has_no_markers() {
        let dir = tempfile::tempdir().unwrap();
        let db = database(&[("demo", "Ping", "int32 seq")]);
        let output = generate(&db, "demo/Ping", &Settings::new());

        let written = output.write_out_files(dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("riptide/demo/Ping.cs")]);
        assert_eq!(std::fs::read_dir(dir.path().join("riptide/demo")).unwrap().count(), 1);
    }
}
