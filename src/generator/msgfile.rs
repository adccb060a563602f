//! Schema round trip: re-emit messages as `.msg` / `.srv` units
//!
//! Messages land in `<pkg>/msgs/<Name>.msg`. A service is written once, as
//! `<pkg>/srvs/<Service>.srv`, whichever of its two halves was selected.

use std::path::PathBuf;

use tracing::info;

use super::{quote_string, Backend, Dependency, GeneratedFile, GenerationOutput, GenerationRun, Generator, TemplateSet};
use crate::model::{ArrayKind, ConstantValue, Field, Message, MessageDatabase, ServiceRole};
use crate::options::{OptionSpec, Settings};
use crate::Result;

const KEY: &str = "msg";
const SUBDIR: &str = "msg_files";
const SERVICE_SEPARATOR: &str = "---";

const FIELD_TEMPLATE: &str = "$type$array $name$constant";
const COMMENT_TEMPLATE: &str = "# $text";

const TEMPLATES: &[(&str, &str)] = &[("field", FIELD_TEMPLATE), ("comment", COMMENT_TEMPLATE)];

/// `.msg` / `.srv` target
#[derive(Debug, Clone, Default)]
pub struct MsgFileGenerator {
    templates: Option<PathBuf>,
}

impl MsgFileGenerator {
    /// `templates` is the base directory searched for `msg/<name>.template` overrides
    pub fn new(templates: Option<PathBuf>) -> Self {
        Self { templates }
    }
}

impl Generator for MsgFileGenerator {
    fn name(&self) -> &'static str {
        KEY
    }

    fn language(&self) -> &'static str {
        "*.msg / *.srv files"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::flag("emit_comments", true, "Write field comments back out")]
    }

    fn generate<'a>(
        &self,
        db: &'a MessageDatabase,
        selection: &[&'a Message],
        settings: &Settings,
    ) -> Result<GenerationOutput> {
        let settings = settings.resolve(&self.options(), KEY)?;
        let backend = MsgFileBackend {
            templates: TemplateSet::load(self.templates.as_deref(), KEY, TEMPLATES)?,
            emit_comments: settings.bool("emit_comments"),
        };

        let mut run = GenerationRun::new(db, settings);
        for &message in selection {
            run.generate_file(&backend, message)?;
        }

        let output = run.finish(SUBDIR, None);
        info!("Generated {} schema files", output.files.len());
        Ok(output)
    }
}

struct MsgFileBackend {
    templates: TemplateSet,
    emit_comments: bool,
}

impl MsgFileBackend {
    fn field(&self, field: &Field) -> Result<Vec<String>> {
        let mut lines = Vec::new();

        if self.emit_comments && !field.comment.is_empty() {
            for text in field.comment.lines() {
                lines.push(self.templates.render("comment", &[("text", text.to_string())])?);
            }
        }

        let array = match field.array {
            Some(ArrayKind::Dynamic) => "[]".to_string(),
            Some(ArrayKind::Fixed(n)) => format!("[{}]", n),
            None => String::new(),
        };
        let constant = match &field.constant {
            Some(ConstantValue::String(s)) => format!(" = {}", quote_string(s)),
            Some(value) => format!(" = {}", value),
            None => String::new(),
        };

        lines.push(self.templates.render(
            "field",
            &[
                ("type", field.ty.clone()),
                ("array", array),
                ("name", field.name.clone()),
                ("constant", constant),
            ],
        )?);
        Ok(lines)
    }

    fn body<'a>(&self, run: &mut GenerationRun<'a>, message: &'a Message) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for dependency in run.dependencies(self, message)? {
            if let Dependency::Missing(ty) = dependency {
                lines.push(format!("# MISSING TYPE: {}", ty));
            }
        }
        for field in &message.fields {
            lines.extend(self.field(field)?);
        }
        Ok(lines)
    }

    fn directory(message: &Message, folder: &str) -> Vec<String> {
        let mut directory = message.package.clone();
        directory.push(folder.to_string());
        directory
    }
}

impl Backend for MsgFileBackend {
    fn render<'a>(&self, run: &mut GenerationRun<'a>, message: &'a Message) -> Result<GeneratedFile> {
        let Some(link) = &message.service else {
            let mut source = self.body(run, message)?.join("\n");
            source.push('\n');
            return Ok(GeneratedFile {
                id: message.id(),
                directory: Self::directory(message, "msgs"),
                file_name: format!("{}.msg", message.name),
                source,
            });
        };

        let sibling = run.db().get(&link.sibling);
        let (request, response) = match link.role {
            ServiceRole::Request => (Some(message), sibling),
            ServiceRole::Response => (sibling, Some(message)),
        };

        let mut lines = match request {
            Some(request) => self.body(run, request)?,
            None => Vec::new(),
        };
        lines.push(SERVICE_SEPARATOR.to_string());
        if let Some(response) = response {
            lines.extend(self.body(run, response)?);
        }

        let mut source = lines.join("\n");
        source.push('\n');
        Ok(GeneratedFile {
            id: message.id(),
            directory: Self::directory(message, "srvs"),
            file_name: format!("{}.srv", link.name),
            source,
        })
    }

    fn covers(&self, message: &Message) -> Vec<String> {
        let mut ids = vec![message.id()];
        if let Some(link) = &message.service {
            ids.push(link.sibling.clone());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MessageParser;

    fn pkg(p: &str) -> Vec<String> {
        vec![p.to_string()]
    }

    fn strip_comments(fields: &[Field]) -> Vec<Field> {
        fields.iter().cloned().map(|f| f.with_comment("")).collect()
    }

    #[test]
    fn test_message_round_trip() {
        let source = "# position\nfloat64[3] pos\nint32[] ids # ids\nuint8 MODE = 2\n\
                      string LABEL = say \"hi\"\\n\nbool ON = True\nfloat32 RATIO = 0.25\n\
                      int64 MIN = -9223372036854775808\nHeader header\n";
        let mut parser = MessageParser::new();
        let first = parser.parse_message(&pkg("demo"), "Thing", source).unwrap();

        let mut db = MessageDatabase::new();
        db.insert(first.clone());
        let message = db.get("demo/Thing").unwrap();
        let output = MsgFileGenerator::default().generate(&db, &[message], &Settings::new()).unwrap();

        let file = output.file("demo/Thing").unwrap();
        assert_eq!(file.directory, vec!["demo", "msgs"]);
        assert_eq!(file.file_name, "Thing.msg");
        assert!(file.source.contains("# MISSING TYPE: std_msgs/Header"));
        assert!(file.source.contains("# position\nfloat64[3] pos"));

        let reparsed = parser.parse_message(&pkg("demo"), "Thing", &file.source).unwrap();
        assert_eq!(strip_comments(&reparsed.fields), strip_comments(&first.fields));
        assert_eq!(reparsed.fields[1].comment, "ids");
    }

    #[test]
    fn test_comments_can_be_suppressed() {
        let mut parser = MessageParser::new();
        let mut db = MessageDatabase::new();
        db.insert(parser.parse_message(&pkg("demo"), "Note", "# hello\nint32 x").unwrap());
        let message = db.get("demo/Note").unwrap();

        let settings = Settings::new().with("emit_comments", false);
        let output = MsgFileGenerator::default().generate(&db, &[message], &settings).unwrap();
        assert_eq!(output.files[0].source, "int32 x\n");
    }

    #[test]
    fn test_service_written_once() {
        let mut parser = MessageParser::new();
        let mut db = MessageDatabase::new();
        let pair = parser
            .parse_service(&pkg("demo"), "AddTwoInts", "int64 a\nint64 b\n---\nint64 sum\n")
            .unwrap();
        for message in pair.into_messages() {
            db.insert(message);
        }

        let request = db.get("demo/AddTwoIntsRequest").unwrap();
        let response = db.get("demo/AddTwoIntsResponse").unwrap();
        let output = MsgFileGenerator::default()
            .generate(&db, &[response, request], &Settings::new())
            .unwrap();

        assert_eq!(output.files.len(), 1);
        let file = &output.files[0];
        assert_eq!(file.directory, vec!["demo", "srvs"]);
        assert_eq!(file.file_name, "AddTwoInts.srv");
        assert_eq!(file.source, "int64 a\nint64 b\n---\nint64 sum\n");

        let reparsed = parser.parse_service(&pkg("demo"), "AddTwoInts", &file.source).unwrap();
        assert_eq!(reparsed.request.fields, request.fields);
        assert_eq!(reparsed.response.fields, response.fields);
    }

    #[test]
    fn test_dependencies_follow() {
        let mut parser = MessageParser::new();
        let mut db = MessageDatabase::new();
        db.insert(parser.parse_message(&pkg("geo"), "Point", "float64 x").unwrap());
        db.insert(parser.parse_message(&pkg("geo"), "Path", "Point[] points").unwrap());
        let path = db.get("geo/Path").unwrap();

        let output = MsgFileGenerator::default().generate(&db, &[path], &Settings::new()).unwrap();
        assert_eq!(output.files.len(), 2);
        assert!(output.file("geo/Point").is_some());
        assert!(output.missing.is_empty());
    }

    #[test]
    fn test_write_out_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut parser = MessageParser::new();
        let mut db = MessageDatabase::new();
        db.insert(parser.parse_message(&pkg("geo"), "Point", "float64 x").unwrap());
        let point = db.get("geo/Point").unwrap();

        let output = MsgFileGenerator::default().generate(&db, &[point], &Settings::new()).unwrap();
        output.write_out_files(dir.path()).unwrap();

        let written = std::fs::read_to_string(dir.path().join("msg_files/geo/msgs/Point.msg")).unwrap();
        assert_eq!(written, "float64 x\n");
    }
}
