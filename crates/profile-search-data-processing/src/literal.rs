//! Parser for the Python literal syntax found in the raw list columns.
//!
//! The `education`, `experience` and `skills` columns of the raw dump hold
//! Python `repr()` output such as `[{'school': {'name': 'MIT'}}]`. This module
//! parses that subset (lists, tuples, sets, dicts, strings, numbers, `None`,
//! `True`, `False`) without evaluating anything. Any other syntax is rejected
//! with a [`LiteralError`].

use thiserror::Error;

const MAX_DEPTH: usize = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected character {found:?} at {position}")]
    UnexpectedChar { found: char, position: usize },
    #[error("unknown name '{name}' at {position}")]
    UnknownName { name: String, position: usize },
    #[error("invalid number '{text}' at {position}")]
    InvalidNumber { text: String, position: usize },
    #[error("invalid escape sequence at {position}")]
    InvalidEscape { position: usize },
    #[error("unterminated string starting at {position}")]
    UnterminatedString { position: usize },
    #[error("trailing input at {position}")]
    TrailingInput { position: usize },
    #[error("literal nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

type Result<T> = std::result::Result<T, LiteralError>;

#[derive(Debug, Clone, PartialEq)]
pub enum PyLiteral {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PyLiteral>),
    Tuple(Vec<PyLiteral>),
    Set(Vec<PyLiteral>),
    Dict(Vec<(PyLiteral, PyLiteral)>),
}

impl PyLiteral {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a string key in a dict. Returns `None` for non-dicts.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Walk nested dicts, e.g. `item.get_path(&["school", "name"])`.
    #[must_use]
    pub fn get_path(&self, keys: &[&str]) -> Option<&Self> {
        keys.iter().try_fold(self, |value, key| value.get(key))
    }
}

/// Parse a complete Python literal. Surrounding whitespace is allowed,
/// anything else after the literal is an error.
pub fn parse(input: &str) -> Result<PyLiteral> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        depth: 0,
    };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < parser.src.len() {
        return Err(LiteralError::TrailingInput {
            position: parser.pos,
        });
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        let position = self.pos;
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(found) => Err(LiteralError::UnexpectedChar { found, position }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(LiteralError::TooDeep);
        }
        Ok(())
    }

    fn value(&mut self) -> Result<PyLiteral> {
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd),
            Some('[') => Ok(PyLiteral::List(self.sequence(']')?.0)),
            Some('(') => {
                let (mut items, saw_comma) = self.sequence(')')?;
                // `(x)` is just a parenthesised value, `(x,)` is a tuple.
                if items.len() == 1 && !saw_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(PyLiteral::Tuple(items))
                }
            }
            Some('{') => self.braced(),
            Some('\'' | '"') => self.strings(false),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.name(),
            Some(found) => Err(LiteralError::UnexpectedChar {
                found,
                position: self.pos,
            }),
        }
    }

    /// Parse `open item, item, ... close`. Returns the items and whether any
    /// comma was seen.
    fn sequence(&mut self, close: char) -> Result<(Vec<PyLiteral>, bool)> {
        self.bump();
        self.enter()?;
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.eat(close) {
                break;
            }
            items.push(self.value()?);
            self.skip_ws();
            let position = self.pos;
            match self.bump() {
                Some(',') => saw_comma = true,
                Some(c) if c == close => break,
                Some(found) => return Err(LiteralError::UnexpectedChar { found, position }),
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
        self.depth -= 1;
        Ok((items, saw_comma))
    }

    fn braced(&mut self) -> Result<PyLiteral> {
        self.bump();
        self.enter()?;
        self.skip_ws();
        if self.eat('}') {
            self.depth -= 1;
            return Ok(PyLiteral::Dict(Vec::new()));
        }

        let first = self.value()?;
        self.skip_ws();
        let literal = if self.eat(':') {
            let mut entries = Vec::new();
            let mut key = first;
            loop {
                self.skip_ws();
                let value = self.value()?;
                entries.push((key, value));
                self.skip_ws();
                if self.eat('}') {
                    break;
                }
                self.expect(',')?;
                self.skip_ws();
                if self.eat('}') {
                    break;
                }
                key = self.value()?;
                self.skip_ws();
                self.expect(':')?;
            }
            PyLiteral::Dict(entries)
        } else {
            let mut items = vec![first];
            loop {
                if self.eat('}') {
                    break;
                }
                self.expect(',')?;
                self.skip_ws();
                if self.eat('}') {
                    break;
                }
                items.push(self.value()?);
                self.skip_ws();
            }
            PyLiteral::Set(items)
        };
        self.depth -= 1;
        Ok(literal)
    }

    fn name(&mut self) -> Result<PyLiteral> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let name = &self.src[start..self.pos];

        let is_prefix = name.len() <= 2 && name.chars().all(|c| "rRuUbB".contains(c));
        if is_prefix && matches!(self.peek(), Some('\'' | '"')) {
            let raw = name.contains(['r', 'R']);
            return self.strings(raw);
        }

        match name {
            "None" => Ok(PyLiteral::None),
            "True" => Ok(PyLiteral::Bool(true)),
            "False" => Ok(PyLiteral::Bool(false)),
            _ => Err(LiteralError::UnknownName {
                name: name.to_string(),
                position: start,
            }),
        }
    }

    fn number(&mut self) -> Result<PyLiteral> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let mut prev = ' ';
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-') && matches!(prev, 'e' | 'E');
            if !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign) {
                break;
            }
            prev = c;
            self.bump();
        }
        let text = self.src[start..self.pos].replace('_', "");
        if let Ok(int) = text.parse::<i64>() {
            return Ok(PyLiteral::Int(int));
        }
        let looks_numeric = text
            .trim_start_matches(['-', '+'])
            .starts_with(|c: char| c.is_ascii_digit() || c == '.');
        match text.parse::<f64>() {
            Ok(float) if looks_numeric => Ok(PyLiteral::Float(float)),
            _ => Err(LiteralError::InvalidNumber {
                text,
                position: start,
            }),
        }
    }

    /// One string literal followed by any adjacent ones (`'a' 'b'` == `'ab'`).
    fn strings(&mut self, raw: bool) -> Result<PyLiteral> {
        let mut out = self.string(raw)?;
        loop {
            let checkpoint = self.pos;
            self.skip_ws();
            if matches!(self.peek(), Some('\'' | '"')) {
                out.push_str(&self.string(false)?);
            } else {
                self.pos = checkpoint;
                break;
            }
        }
        Ok(PyLiteral::Str(out))
    }

    fn string(&mut self, raw: bool) -> Result<String> {
        let start = self.pos;
        let quote = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
        let pair: String = [quote, quote].iter().collect();
        let triple = self.rest().starts_with(&pair);
        if triple {
            self.pos += 2;
        }

        let unterminated = LiteralError::UnterminatedString { position: start };
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or_else(|| unterminated.clone())?;
            if c == quote {
                if !triple {
                    break;
                }
                if self.rest().starts_with(&pair) {
                    self.pos += 2;
                    break;
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(unterminated);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let escape_at = self.pos - 1;
            let esc = self.bump().ok_or_else(|| unterminated.clone())?;
            if raw {
                out.push('\\');
                out.push(esc);
                continue;
            }
            match esc {
                '\n' => {}
                '\\' | '\'' | '"' => out.push(esc),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'a' => out.push('\x07'),
                'b' => out.push('\x08'),
                'f' => out.push('\x0c'),
                'v' => out.push('\x0b'),
                'x' => out.push(self.hex_escape(2, escape_at)?),
                'u' => out.push(self.hex_escape(4, escape_at)?),
                'U' => out.push(self.hex_escape(8, escape_at)?),
                '0'..='7' => {
                    let mut code = esc.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match self.peek().and_then(|d| d.to_digit(8)) {
                            Some(d) => {
                                code = code * 8 + d;
                                self.bump();
                            }
                            None => break,
                        }
                    }
                    out.push(
                        char::from_u32(code)
                            .ok_or(LiteralError::InvalidEscape { position: escape_at })?,
                    );
                }
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
        Ok(out)
    }

    fn hex_escape(&mut self, digits: usize, position: usize) -> Result<char> {
        let hex = self
            .rest()
            .get(..digits)
            .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or(LiteralError::InvalidEscape { position })?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| LiteralError::InvalidEscape { position })?;
        self.pos += digits;
        char::from_u32(code).ok_or(LiteralError::InvalidEscape { position })
    }
}
