//! Message/service grammar
//!
//! A unit is a plain-text `.msg` or `.srv` definition, one field per line:
//!
//! ```text
//! # Comment lines attach to the next field
//! Header header
//! int32 x
//! float64[3] position      # fixed-size array
//! string[] names           # dynamic array
//! uint8 MODE_FAST = 1      # constant
//! ---
//! bool success             # service response
//! ```
//!
//! [`MessageParser`] layers this grammar on top of [`Cursor`] and is meant to
//! be reused across many units; the only state it keeps between units is the
//! type index filled by [`MessageParser::register_type`].

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::cursor::{Cursor, INLINE_WHITESPACE};
use crate::error::{ParseError, ParseErrorKind};
use crate::model::{join_id, ArrayKind, ConstantValue, Field, Message, ServicePair};

/// Built-in scalar types understood by every target
pub const PRIMITIVE_TYPES: &[&str] = &[
    "bool", "int8", "uint8", "int16", "uint16", "int32", "uint32", "int64", "uint64", "float32",
    "float64", "string", "time", "duration",
];

/// Type names rewritten before anything else sees them
pub const TYPE_ALIASES: &[(&str, &str)] = &[
    ("Header", "std_msgs/Header"),
    ("char", "uint8"),
    ("byte", "int8"),
];

const INTEGER_TYPES: &[&str] = &[
    "int8", "uint8", "int16", "uint16", "int32", "uint32", "int64", "uint64",
];

const FLOAT_TYPES: &[&str] = &["float32", "float64"];

const TYPE_TERMINATORS: &[char] = &[' ', '\t', '\r', '\n', '['];

const SERVICE_SEPARATOR: &str = "---";

pub fn is_primitive(ty: &str) -> bool {
    PRIMITIVE_TYPES.contains(&ty)
}

/// Apply the alias table to a raw type token
pub fn resolve_alias(ty: &str) -> &str {
    TYPE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == ty)
        .map(|(_, target)| *target)
        .unwrap_or(ty)
}

/// Kind of input unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// `.msg` - one message
    Message,
    /// `.srv` - request/response pair
    Service,
}

/// Result of parsing one unit
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedUnit {
    Message(Message),
    Service(ServicePair),
}

impl ParsedUnit {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            ParsedUnit::Message(message) => vec![message],
            ParsedUnit::Service(pair) => pair.into_messages().into(),
        }
    }
}

/// Names of all units known before parsing starts
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    ids: BTreeSet<String>,
}

impl TypeIndex {
    pub fn register(&mut self, package: &[String], name: &str) {
        self.ids.insert(join_id(package, name));
    }

    /// Same lookup rule as the message database: exact, then package-relative
    pub fn contains(&self, package: &[String], ty: &str) -> bool {
        self.ids.contains(ty) || self.ids.contains(&join_id(package, ty))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

enum Entry {
    Field(Field),
    /// Offset of the separator's first dash
    Separator(usize),
}

/// Parser for `.msg` / `.srv` units
#[derive(Debug, Default)]
pub struct MessageParser {
    cursor: Cursor,
    types: TypeIndex,
}

impl MessageParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a unit name so unresolvable field types can be diagnosed
    pub fn register_type(&mut self, package: &[String], name: &str) {
        self.types.register(package, name);
    }

    pub fn type_index(&self) -> &TypeIndex {
        &self.types
    }

    /// Parse a unit of either kind
    pub fn parse_unit(
        &mut self,
        kind: UnitKind,
        package: &[String],
        name: &str,
        source: &str,
    ) -> Result<ParsedUnit, ParseError> {
        match kind {
            UnitKind::Message => self.parse_message(package, name, source).map(ParsedUnit::Message),
            UnitKind::Service => self.parse_service(package, name, source).map(ParsedUnit::Service),
        }
    }

    /// Parse a message unit; a `---` separator is an error here
    pub fn parse_message(&mut self, package: &[String], name: &str, source: &str) -> Result<Message, ParseError> {
        let mut sections = self.parse_sections(source, 0)?;
        let fields = sections.pop().unwrap_or_default();

        let message = Message::new(package.to_vec(), name, fields);
        self.check_types(&message);
        debug!("Parsed message {} ({} fields)", message.id(), message.fields.len());
        Ok(message)
    }

    /// Parse a service unit into `{name}Request` / `{name}Response`.
    ///
    /// Without a separator every field belongs to the response. A second
    /// separator is an error.
    pub fn parse_service(&mut self, package: &[String], name: &str, source: &str) -> Result<ServicePair, ParseError> {
        let mut sections = self.parse_sections(source, 1)?;
        let response = sections.pop().unwrap_or_default();
        let request = sections.pop().unwrap_or_default();

        let pair = ServicePair::new(package.to_vec(), name, request, response);
        self.check_types(&pair.request);
        self.check_types(&pair.response);
        debug!(
            "Parsed service {} ({} request fields, {} response fields)",
            join_id(package, name),
            pair.request.fields.len(),
            pair.response.fields.len()
        );
        Ok(pair)
    }

    /// Split the unit into field lists at `---`, allowing at most `max_separators`
    fn parse_sections(&mut self, source: &str, max_separators: usize) -> Result<Vec<Vec<Field>>, ParseError> {
        self.cursor.load(source);
        let mut sections = vec![Vec::new()];

        while let Some(entry) = self.next_entry()? {
            match entry {
                Entry::Field(field) => {
                    if let Some(current) = sections.last_mut() {
                        current.push(field);
                    }
                }
                Entry::Separator(offset) => {
                    if sections.len() > max_separators {
                        return Err(self.cursor.error_at(offset, ParseErrorKind::UnexpectedSeparator));
                    }
                    sections.push(Vec::new());
                }
            }
        }

        Ok(sections)
    }

    fn next_entry(&mut self) -> Result<Option<Entry>, ParseError> {
        let mut comments = Vec::new();

        loop {
            self.cursor.skip_whitespace();
            if !self.cursor.available() {
                return Ok(None);
            }

            match self.cursor.peek()? {
                '#' => {
                    self.cursor.consume()?;
                    comments.push(self.cursor.read_to_end_of_line().trim().to_string());
                }
                '-' => {
                    let offset = self.cursor.offset();
                    self.cursor.validate(SERVICE_SEPARATOR)?;
                    return Ok(Some(Entry::Separator(offset)));
                }
                _ => return self.parse_field(comments).map(|field| Some(Entry::Field(field))),
            }
        }
    }

    fn parse_field(&mut self, mut comments: Vec<String>) -> Result<Field, ParseError> {
        let raw_type = self.cursor.read_to_separator(TYPE_TERMINATORS);
        if raw_type.is_empty() {
            return Err(self.cursor.error(ParseErrorKind::MissingFieldType));
        }
        let ty = resolve_alias(&raw_type).to_string();
        self.cursor.skip_characters(INLINE_WHITESPACE);

        let array = if self.cursor.available() && self.cursor.peek()? == '[' {
            Some(self.read_array_marker()?)
        } else {
            None
        };

        let name = self.read_field_name()?;
        self.cursor.skip_characters(INLINE_WHITESPACE);

        let mut constant = None;
        if self.cursor.available() && self.cursor.peek()? == '=' {
            if array.is_some() {
                return Err(self.cursor.error(ParseErrorKind::ArrayConstant));
            }
            self.cursor.consume()?;
            self.cursor.skip_characters(INLINE_WHITESPACE);
            constant = Some(self.read_constant_value(&ty)?);
            self.cursor.skip_characters(INLINE_WHITESPACE);
        }

        if self.cursor.available() && self.cursor.peek()? == '#' {
            self.cursor.consume()?;
            comments.push(self.cursor.read_to_end_of_line().trim().to_string());
        }

        let rest_offset = self.cursor.offset();
        let rest = self.cursor.read_to_end_of_line();
        if !rest.trim().is_empty() {
            warn!(
                "Ignoring trailing text '{}' after field {} at {}",
                rest.trim(),
                name,
                self.cursor.position_at(rest_offset)
            );
        }

        Ok(Field {
            ty,
            name,
            array,
            constant,
            comment: comments.join("\n"),
        })
    }

    /// `[` [integer] `]`, cursor on the opening bracket
    fn read_array_marker(&mut self) -> Result<ArrayKind, ParseError> {
        self.cursor.consume()?;
        self.cursor.skip_characters(INLINE_WHITESPACE);

        let kind = if self.cursor.peek()? == ']' {
            ArrayKind::Dynamic
        } else {
            let c = self.cursor.peek()?;
            if !c.is_ascii_digit() {
                return Err(self.cursor.error(ParseErrorKind::ExpectedDigit(c)));
            }
            let start = self.cursor.offset();
            let length = self.cursor.read_integer()?;
            let length = usize::try_from(length)
                .map_err(|_| self.cursor.error_at(start, ParseErrorKind::IntegerOverflow))?;
            self.cursor.skip_characters(INLINE_WHITESPACE);
            self.cursor.check(']')?;
            ArrayKind::Fixed(length)
        };

        self.cursor.consume()?;
        self.cursor.skip_characters(INLINE_WHITESPACE);
        Ok(kind)
    }

    /// `[A-Za-z][A-Za-z0-9_]*`
    fn read_field_name(&mut self) -> Result<String, ParseError> {
        let c = self.cursor.peek()?;
        if !c.is_ascii_alphabetic() {
            return Err(self.cursor.error(ParseErrorKind::InvalidFieldName(c)));
        }
        Ok(self.cursor.read_while(|c| c.is_ascii_alphanumeric() || c == '_'))
    }

    /// The literal shape is dictated by the declared field type
    fn read_constant_value(&mut self, ty: &str) -> Result<ConstantValue, ParseError> {
        if ty == "bool" {
            return self.cursor.read_bool().map(ConstantValue::Bool);
        }
        if INTEGER_TYPES.contains(&ty) {
            return self.cursor.read_integer().map(ConstantValue::Integer);
        }
        if FLOAT_TYPES.contains(&ty) {
            return self.cursor.read_float().map(ConstantValue::Float);
        }
        if ty == "string" {
            if self.cursor.available() && self.cursor.peek()? == '"' {
                return self.cursor.read_string_literal().map(ConstantValue::String);
            }
            let raw = self.cursor.read_to_end_of_line();
            return Ok(ConstantValue::String(raw.trim().to_string()));
        }
        Err(self.cursor.error(ParseErrorKind::InvalidConstantType(ty.to_string())))
    }

    fn check_types(&self, message: &Message) {
        if self.types.is_empty() {
            return;
        }
        for field in &message.fields {
            if !is_primitive(&field.ty) && !self.types.contains(&message.package, &field.ty) {
                warn!("{}: field '{}' has unknown type {}", message.id(), field.name, field.ty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(p: &str) -> Vec<String> {
        vec![p.to_string()]
    }

    fn parse(source: &str) -> Message {
        MessageParser::new().parse_message(&pkg("test"), "Test", source).unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        MessageParser::new().parse_message(&pkg("test"), "Test", source).unwrap_err()
    }

    #[test]
    fn test_end_to_end_fields() {
        let msg = parse("int32 x\nint32[] y\nstring name = \"hi\"\n");
        assert_eq!(msg.fields.len(), 3);

        assert_eq!(msg.fields[0], Field::new("int32", "x"));
        assert_eq!(msg.fields[1], Field::new("int32", "y").with_array(ArrayKind::Dynamic));
        assert_eq!(
            msg.fields[2],
            Field::new("string", "name").with_constant(ConstantValue::String("hi".into()))
        );
        assert_eq!(msg.id(), "test/Test");
    }

    #[test]
    fn test_fixed_array() {
        let msg = parse("uint8[4] data");
        let field = &msg.fields[0];
        assert_eq!(field.ty, "uint8");
        assert_eq!(field.name, "data");
        assert_eq!(field.array, Some(ArrayKind::Fixed(4)));
        assert_eq!(field.constant, None);
        assert_eq!(field.comment, "");
    }

    #[test]
    fn test_array_marker_spacing() {
        let msg = parse("float64 [ 3 ] position\nint8 [ ] raw");
        assert_eq!(msg.fields[0].array, Some(ArrayKind::Fixed(3)));
        assert_eq!(msg.fields[1].array, Some(ArrayKind::Dynamic));
    }

    #[test]
    fn test_aliases_applied() {
        let msg = parse("Header header\nchar c\nbyte b\nstd_msgs/Header h2");
        assert_eq!(msg.fields[0].ty, "std_msgs/Header");
        assert_eq!(msg.fields[1].ty, "uint8");
        assert_eq!(msg.fields[2].ty, "int8");
        assert_eq!(msg.fields[0].ty, msg.fields[3].ty);
    }

    #[test]
    fn test_comments_attach_to_next_field() {
        let msg = parse("# first\n# second\nint32 x # trailing\n\nint32 y\n# dangling\n");
        assert_eq!(msg.fields[0].comment, "first\nsecond\ntrailing");
        assert_eq!(msg.fields[1].comment, "");
        assert_eq!(msg.fields.len(), 2);
    }

    #[test]
    fn test_constants_by_type() {
        let msg = parse(
            "bool FLAG = True\nint8 NEG = -3\nuint64 BIG = 18446744073709551615\n\
             float32 RATIO = 0.25 # quarter\nfloat64 SCI = 1e3\nstring RAW = hello world\n",
        );
        assert_eq!(msg.fields[0].constant, Some(ConstantValue::Bool(true)));
        assert_eq!(msg.fields[1].constant, Some(ConstantValue::Integer(-3)));
        assert_eq!(msg.fields[2].constant, Some(ConstantValue::Integer(i128::from(u64::MAX))));
        assert_eq!(msg.fields[3].constant, Some(ConstantValue::Float(0.25)));
        assert_eq!(msg.fields[3].comment, "quarter");
        assert_eq!(msg.fields[4].constant, Some(ConstantValue::Float(1000.0)));
        assert_eq!(msg.fields[5].constant, Some(ConstantValue::String("hello world".into())));
    }

    #[test]
    fn test_quoted_string_constant_escapes() {
        let msg = parse("string GREETING = \"a\\tb\" # note");
        assert_eq!(msg.fields[0].constant, Some(ConstantValue::String("a\tb".into())));
        assert_eq!(msg.fields[0].comment, "note");
    }

    #[test]
    fn test_unterminated_string_constant_fails_on_its_line() {
        let err = parse_err("string A = \"abc\nint32 x\nstring B = \"def\"\nint32 y\n");
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
        assert_eq!(err.position.line, 1);
        assert_eq!(err.position.column, 12);

        let err = parse_err("int32 x\nstring A = \"abc");
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
        assert_eq!(err.position.line, 2);

        let msg = parse("string A = \"abc\"\nint32 x\nstring B = \"def\"\nint32 y\n");
        let names: Vec<_> = msg.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["A", "x", "B", "y"]);
    }

    #[test]
    fn test_invalid_constant_type() {
        let err = parse_err("time STAMP = 5");
        assert_eq!(err.kind, ParseErrorKind::InvalidConstantType("time".into()));

        let err = parse_err("geometry_msgs/Point ORIGIN = 0");
        assert!(matches!(err.kind, ParseErrorKind::InvalidConstantType(_)));
    }

    #[test]
    fn test_array_constant_rejected() {
        let err = parse_err("int32[2] VALUES = 1");
        assert_eq!(err.kind, ParseErrorKind::ArrayConstant);
    }

    #[test]
    fn test_invalid_field_name_position() {
        let err = parse_err("int32 x\nint32 9lives");
        assert_eq!(err.kind, ParseErrorKind::InvalidFieldName('9'));
        assert_eq!(err.position.line, 2);
        assert_eq!(err.position.column, 7);
    }

    #[test]
    fn test_malformed_literals_fail() {
        assert_eq!(parse_err("bool B = maybe").kind, ParseErrorKind::InvalidBool);
        assert!(matches!(parse_err("int32 I = x").kind, ParseErrorKind::ExpectedDigit('x')));
        assert!(matches!(parse_err("uint8[x] d").kind, ParseErrorKind::ExpectedDigit('x')));
        assert!(matches!(parse_err("uint8[4 d").kind, ParseErrorKind::Mismatch { expected: ']', .. }));
        assert_eq!(parse_err("int32").kind, ParseErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_trailing_text_is_not_fatal() {
        let msg = parse("int32 x junk here\nint32 y");
        assert_eq!(msg.fields.len(), 2);
        assert_eq!(msg.fields[0].name, "x");
    }

    #[test]
    fn test_separator_in_message_rejected() {
        let err = parse_err("int32 x\n---\nint32 y");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedSeparator);
        assert_eq!(err.position.line, 2);
    }

    #[test]
    fn test_service_split() {
        let mut parser = MessageParser::new();
        let pair = parser
            .parse_service(&pkg("demo"), "AddTwoInts", "int64 a\nint64 b\n---\nint64 sum\n")
            .unwrap();

        assert_eq!(pair.request.name, "AddTwoIntsRequest");
        assert_eq!(pair.response.name, "AddTwoIntsResponse");
        assert_eq!(pair.request.fields.len(), 2);
        assert_eq!(pair.response.fields.len(), 1);
        assert_eq!(pair.request.service.as_ref().unwrap().sibling, pair.response.id());
        assert_eq!(pair.response.service.as_ref().unwrap().sibling, pair.request.id());
    }

    #[test]
    fn test_service_without_separator() {
        let mut parser = MessageParser::new();
        let pair = parser.parse_service(&pkg("demo"), "Status", "bool ok\nstring detail").unwrap();
        assert!(pair.request.fields.is_empty());
        assert_eq!(pair.response.fields.len(), 2);
    }

    #[test]
    fn test_service_empty_halves() {
        let mut parser = MessageParser::new();
        let pair = parser.parse_service(&pkg("demo"), "Trigger", "---\n").unwrap();
        assert!(pair.request.fields.is_empty());
        assert!(pair.response.fields.is_empty());

        let pair = parser.parse_service(&pkg("demo"), "Empty", "").unwrap();
        assert_eq!(pair.into_messages().len(), 2);
    }

    #[test]
    fn test_service_second_separator_rejected() {
        let mut parser = MessageParser::new();
        let err = parser
            .parse_service(&pkg("demo"), "Bad", "int32 a\n---\nint32 b\n---\nint32 c")
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedSeparator);
        assert_eq!(err.position.line, 4);
    }

    #[test]
    fn test_parser_reuse_across_units() {
        let mut parser = MessageParser::new();
        assert!(parser.parse_message(&pkg("a"), "Broken", "int32 =").is_err());

        let msg = parser.parse_message(&pkg("a"), "Fine", "int32 x").unwrap();
        assert_eq!(msg.fields.len(), 1);

        let unit = parser
            .parse_unit(UnitKind::Service, &pkg("a"), "Srv", "int32 a\n---\n")
            .unwrap();
        assert_eq!(unit.into_messages().len(), 2);
    }

    #[test]
    fn test_type_index_lookup() {
        let mut parser = MessageParser::new();
        parser.register_type(&pkg("nav"), "Pose");
        parser.register_type(&pkg("std_msgs"), "Header");

        let index = parser.type_index();
        assert_eq!(index.len(), 2);
        assert!(index.contains(&pkg("nav"), "Pose"));
        assert!(index.contains(&pkg("other"), "nav/Pose"));
        assert!(!index.contains(&pkg("other"), "Pose"));

        // unknown types only produce a diagnostic
        let msg = parser.parse_message(&pkg("nav"), "Path", "Header h\nPose p\nUnknown u").unwrap();
        assert_eq!(msg.fields.len(), 3);
    }

    #[test]
    fn test_primitive_vocabulary() {
        assert_eq!(PRIMITIVE_TYPES.len(), 14);
        assert!(is_primitive("duration"));
        assert!(!is_primitive("Header"));
        assert_eq!(resolve_alias("Header"), "std_msgs/Header");
        assert_eq!(resolve_alias("int32"), "int32");
    }
}
