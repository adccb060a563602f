//! `$name` placeholder templates
//!
//! `$name` and `${name}` are replaced by the value bound to `name`; `$$` is a
//! literal dollar sign. A placeholder with no binding is an error.

use std::collections::BTreeMap;

use crate::{Error, Result};

/// A parsed-on-demand template string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitute `vars` into the template
    pub fn substitute(&self, vars: &[(&str, String)]) -> Result<String> {
        let vars: BTreeMap<&str, &str> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let mut output = String::with_capacity(self.source.len());
        let mut chars = self.source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            if c != '$' {
                output.push(c);
                continue;
            }

            let next = chars.peek().map(|&(_, c)| c);
            let name = match next {
                Some('$') => {
                    chars.next();
                    output.push('$');
                    continue;
                }
                Some('{') => {
                    chars.next();
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, c)) => name.push(c),
                            None => {
                                return Err(Error::Template(format!("unterminated placeholder at byte {}", offset)));
                            }
                        }
                    }
                    name
                }
                Some(c) if is_identifier_start(c) => {
                    let mut name = String::new();
                    while let Some(&(_, c)) = chars.peek() {
                        if !is_identifier_char(c) {
                            break;
                        }
                        name.push(c);
                        chars.next();
                    }
                    name
                }
                _ => return Err(Error::Template(format!("invalid placeholder at byte {}", offset))),
            };

            let value = vars
                .get(name.as_str())
                .ok_or_else(|| Error::Template(format!("no value for placeholder '{}'", name)))?;
            output.push_str(value);
        }

        Ok(output)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
