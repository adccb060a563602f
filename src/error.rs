//! Error types for tidegen

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Location inside the buffer a parser was working on.
///
/// `line` and `column` are 1-based, `offset` is the 0-based character index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {} (offset {})", self.line, self.column, self.offset)
    }
}

/// What went wrong while scanning or parsing a schema unit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("expected '{expected}', found '{found}'")]
    Mismatch { expected: char, found: char },

    #[error("expected decimal digit (0-9), found '{0}'")]
    ExpectedDigit(char),

    #[error("expected hexadecimal digit (0-f), found '{0}'")]
    ExpectedHexDigit(char),

    #[error("integer literal out of range")]
    IntegerOverflow,

    #[error("invalid float literal '{0}'")]
    InvalidFloat(String),

    #[error("expected boolean value ('True', 'true', 'False' or 'false')")]
    InvalidBool,

    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),

    #[error("invalid unicode code point {0:#x}")]
    InvalidCodepoint(u32),

    #[error("string literal is not closed on its line")]
    UnterminatedString,

    #[error("expected field name starting with [a-zA-Z], found '{0}'")]
    InvalidFieldName(char),

    #[error("expected field type")]
    MissingFieldType,

    #[error("invalid type for constant: {0}")]
    InvalidConstantType(String),

    #[error("array fields cannot carry a constant value")]
    ArrayConstant,

    #[error("unexpected '---' separator")]
    UnexpectedSeparator,
}

/// A position-tagged parse failure
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at {position}")]
pub struct ParseError {
    pub position: Position,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(position: Position, kind: ParseErrorKind) -> Self {
        Self { position, kind }
    }
}

/// tidegen error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("config error: {0}")]
    Config(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown generator: {0}")]
    UnknownGenerator(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("unknown message: {0}")]
    UnknownMessage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tidegen operations
pub type Result<T> = std::result::Result<T, Error>;
