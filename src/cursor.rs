//! Character cursor with position tracking
//!
//! [`Cursor`] knows nothing about any grammar. It scans one buffer at a time,
//! hands out characters and spans, and reads the literal forms shared by all
//! schema grammars: integers, floats, booleans and quoted strings.
//!
//! Every failure carries the [`Position`] it happened at. Line and column are
//! recomputed from the start of the buffer on demand, which is linear in the
//! offset but only ever happens on the error path.

use crate::error::{ParseError, ParseErrorKind, Position};

/// Whitespace that never ends a line
pub const INLINE_WHITESPACE: &[char] = &[' ', '\t'];

const DECIMAL_POINT: char = '.';

/// A re-loadable scanner over one text buffer
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    data: Vec<char>,
    pos: usize,
}

impl Cursor {
    /// Create a cursor positioned at the start of `data`
    pub fn new(data: &str) -> Self {
        Self {
            data: data.chars().collect(),
            pos: 0,
        }
    }

    /// Replace the buffer and rewind
    pub fn load(&mut self, data: &str) {
        self.data = data.chars().collect();
        self.pos = 0;
    }

    /// Rewind to the start of the current buffer
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// True while there is input left
    pub fn available(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Current character offset
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Line/column of the current offset
    pub fn position(&self) -> Position {
        self.position_at(self.pos)
    }

    /// Line/column of an arbitrary offset, computed by scanning from the start
    pub fn position_at(&self, offset: usize) -> Position {
        let mut line = 1;
        let mut column = 1;
        for &c in self.data.iter().take(offset) {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Position { line, column, offset }
    }

    /// Build an error tagged with the current position
    pub fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.position(), kind)
    }

    /// Build an error tagged with the position of `offset`
    pub fn error_at(&self, offset: usize, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.position_at(offset), kind)
    }

    pub fn peek(&self) -> Result<char, ParseError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof))
    }

    pub fn read(&mut self) -> Result<char, ParseError> {
        let c = self.peek()?;
        self.pos += 1;
        Ok(c)
    }

    pub fn consume(&mut self) -> Result<(), ParseError> {
        self.read().map(|_| ())
    }

    /// Assert the next character without consuming it
    pub fn check(&self, expected: char) -> Result<(), ParseError> {
        let found = self.peek()?;
        if found != expected {
            return Err(self.error(ParseErrorKind::Mismatch { expected, found }));
        }
        Ok(())
    }

    /// Consume `expected` exactly, failing at the first diverging character
    pub fn validate(&mut self, expected: &str) -> Result<(), ParseError> {
        for c in expected.chars() {
            self.check(c)?;
            self.pos += 1;
        }
        Ok(())
    }

    /// Skip any whitespace, newlines included. Returns how many chars were skipped.
    pub fn skip_whitespace(&mut self) -> usize {
        self.skip_while(char::is_whitespace)
    }

    /// Skip characters contained in `set`
    pub fn skip_characters(&mut self, set: &[char]) -> usize {
        self.skip_while(|c| set.contains(&c))
    }

    /// Skip characters while `pred` holds
    pub fn skip_while(&mut self, pred: impl Fn(char) -> bool) -> usize {
        let start = self.pos;
        while self.pos < self.data.len() && pred(self.data[self.pos]) {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Read characters while `pred` holds
    pub fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        self.skip_while(pred);
        self.data[start..self.pos].iter().collect()
    }

    /// Read up to (not including) the first character in `separators`, or to end of input
    pub fn read_to_separator(&mut self, separators: &[char]) -> String {
        self.read_while(|c| !separators.contains(&c))
    }

    /// Read up to (not including) the next whitespace character
    pub fn read_to_whitespace(&mut self) -> String {
        self.read_while(|c| !c.is_whitespace())
    }

    /// Read the rest of the current line; the newline itself is left in place
    pub fn read_to_end_of_line(&mut self) -> String {
        self.read_while(|c| c != '\n')
    }

    pub fn read_to_end_of_file(&mut self) -> String {
        self.read_while(|_| true)
    }

    /// Consume an optional leading `-` (with inline whitespace after it)
    fn read_sign(&mut self) -> Result<bool, ParseError> {
        self.skip_characters(INLINE_WHITESPACE);
        if self.peek()? == '-' {
            self.pos += 1;
            self.skip_characters(INLINE_WHITESPACE);
            return Ok(true);
        }
        Ok(false)
    }

    /// Read a decimal integer with optional leading `-`
    pub fn read_integer(&mut self) -> Result<i128, ParseError> {
        let negative = self.read_sign()?;

        let c = self.peek()?;
        let mut value = i128::from(
            c.to_digit(10)
                .ok_or_else(|| self.error(ParseErrorKind::ExpectedDigit(c)))?,
        );
        self.pos += 1;

        while let Some(digit) = self.data.get(self.pos).and_then(|c| c.to_digit(10)) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(i128::from(digit)))
                .ok_or_else(|| self.error(ParseErrorKind::IntegerOverflow))?;
            self.pos += 1;
        }

        Ok(if negative { -value } else { value })
    }

    /// Read `digits` hexadecimal digits with optional leading `-`
    pub fn read_hex_integer(&mut self, digits: usize) -> Result<i64, ParseError> {
        let negative = self.read_sign()?;
        let value = self.read_hex_digits(digits)?;
        Ok(if negative { -value } else { value })
    }

    /// Exactly `digits` hex digits at the current position, no sign or whitespace
    fn read_hex_digits(&mut self, digits: usize) -> Result<i64, ParseError> {
        let mut value: i64 = 0;
        for _ in 0..digits {
            let c = self.peek()?;
            let digit = c
                .to_digit(16)
                .ok_or_else(|| self.error(ParseErrorKind::ExpectedHexDigit(c)))?;
            value = value
                .checked_mul(16)
                .and_then(|v| v.checked_add(i64::from(digit)))
                .ok_or_else(|| self.error(ParseErrorKind::IntegerOverflow))?;
            self.pos += 1;
        }
        Ok(value)
    }

    /// Read a decimal float: `[-] digits [. digits] [e [+|-] digits]`
    pub fn read_float(&mut self) -> Result<f64, ParseError> {
        let negative = self.read_sign()?;
        let start = self.pos;

        let mut literal = String::new();
        if negative {
            literal.push('-');
        }

        let integral = self.read_while(|c| c.is_ascii_digit());
        literal.push_str(&integral);

        let mut fraction = String::new();
        if self.data.get(self.pos) == Some(&DECIMAL_POINT) {
            self.pos += 1;
            fraction = self.read_while(|c| c.is_ascii_digit());
            literal.push(DECIMAL_POINT);
            literal.push_str(&fraction);
        }

        if integral.is_empty() && fraction.is_empty() {
            let c = self.peek()?;
            return Err(self.error(ParseErrorKind::ExpectedDigit(c)));
        }

        if matches!(self.data.get(self.pos), Some('e') | Some('E')) {
            self.pos += 1;
            literal.push('e');
            if let Some(&sign) = self.data.get(self.pos) {
                if sign == '+' || sign == '-' {
                    self.pos += 1;
                    literal.push(sign);
                }
            }
            let exponent = self.read_while(|c| c.is_ascii_digit());
            if exponent.is_empty() {
                let c = self.peek()?;
                return Err(self.error(ParseErrorKind::ExpectedDigit(c)));
            }
            literal.push_str(&exponent);
        }

        literal
            .parse::<f64>()
            .map_err(|_| self.error_at(start, ParseErrorKind::InvalidFloat(literal.clone())))
    }

    /// Read `true`, `True`, `false` or `False`
    pub fn read_bool(&mut self) -> Result<bool, ParseError> {
        self.skip_characters(INLINE_WHITESPACE);
        let start = self.pos;

        let result = match self.peek() {
            Ok('T' | 't') => {
                self.pos += 1;
                self.validate("rue").map(|_| true)
            }
            Ok('F' | 'f') => {
                self.pos += 1;
                self.validate("alse").map(|_| false)
            }
            _ => Err(self.error(ParseErrorKind::InvalidBool)),
        };

        result.map_err(|_| self.error_at(start, ParseErrorKind::InvalidBool))
    }

    /// Read a double-quoted string literal, resolving backslash escapes.
    ///
    /// The closing quote must be on the same line as the opening one.
    pub fn read_string_literal(&mut self) -> Result<String, ParseError> {
        self.skip_characters(INLINE_WHITESPACE);
        self.check('"')?;
        let open = self.pos;
        self.pos += 1;

        let mut value = String::new();
        loop {
            match self.read_in_line(open)? {
                '"' => return Ok(value),
                '\\' => {
                    let escape = self.read_in_line(open)?;
                    match escape {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        '/' => value.push('/'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'u' => {
                            let start = self.pos;
                            let code = self.read_hex_digits(4)?;
                            let ch = u32::try_from(code).ok().and_then(char::from_u32).ok_or_else(|| {
                                self.error_at(start, ParseErrorKind::InvalidCodepoint(code as u32))
                            })?;
                            value.push(ch);
                        }
                        other => {
                            return Err(self.error_at(self.pos - 1, ParseErrorKind::InvalidEscape(other)));
                        }
                    }
                }
                c => value.push(c),
            }
        }
    }

    /// Next character of a literal opened at `open`; a line break or the end
    /// of input is reported at `open`
    fn read_in_line(&mut self, open: usize) -> Result<char, ParseError> {
        match self.data.get(self.pos) {
            Some(&c) if c != '\n' => {
                self.pos += 1;
                Ok(c)
            }
            _ => Err(self.error_at(open, ParseErrorKind::UnterminatedString)),
        }
    }
}
