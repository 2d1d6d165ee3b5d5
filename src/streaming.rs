//! Single-pass token-scanning flattener.
//!
//! [`StreamingFlattener`] never builds a document tree. It walks the JSON
//! token stream forward, and for every display-name property it meets it
//! takes the next token as the output key, then skips ahead to the second
//! following `Value` property and emits the token after it as the value.
//!
//! This is a lighter alternative to [`crate::Flattener`], not an equivalent:
//!
//! - no identity grouping; a tag reported twice yields two entries with the
//!   same key (JSON readers typically keep the last one),
//! - no output template, no freshness stamp, no name overrides,
//! - pairing is positional, so a reading whose `Value` precedes its display
//!   name pairs with the next reading's value.

use std::borrow::Cow;
use std::io::Write;

use serde_json::{Number, Value};

use crate::config::{DEFAULT_DISPLAY_NAME_PROPERTY, VALUE_PROPERTY};
use crate::error::{FlattenError, Result};

/// One JSON token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    PropertyName(Cow<'a, str>),
    String(Cow<'a, str>),
    Number(Number),
    Bool(bool),
    Null,
}

impl Token<'_> {
    /// Text of a string, number or boolean token.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Token::String(s) => Some(s.to_string()),
            Token::Number(n) => Some(n.to_string()),
            Token::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Scalar tokens as values; structural tokens and names become `null`.
    pub fn into_value(self) -> Value {
        match self {
            Token::String(s) => Value::String(s.into_owned()),
            Token::Number(n) => Value::Number(n),
            Token::Bool(b) => Value::Bool(b),
            _ => Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// Forward-only JSON tokenizer over a string slice.
///
/// Strings without escapes are borrowed from the source. After the first
/// error the iterator is exhausted; [`JsonTokens::restart`] rewinds it.
#[derive(Debug, Clone)]
pub struct JsonTokens<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<Container>,
    expect_key: bool,
    failed: bool,
}

impl<'a> JsonTokens<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            stack: Vec::new(),
            expect_key: false,
            failed: false,
        }
    }

    /// Byte offset of the next unread character.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Rewind to the start of the source.
    pub fn restart(&mut self) {
        *self = Self::new(self.src);
    }

    fn error(&mut self, reason: impl Into<String>) -> FlattenError {
        self.failed = true;
        FlattenError::Stream {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.src.as_bytes();
        while matches!(bytes.get(self.pos), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn read_string(&mut self) -> Result<Cow<'a, str>> {
        let src = self.src;
        let bytes = src.as_bytes();
        let start = self.pos + 1;
        let mut i = start;
        let mut chunk_start = start;
        let mut owned: Option<String> = None;

        loop {
            let Some(&b) = bytes.get(i) else {
                self.pos = i;
                return Err(self.error("unterminated string"));
            };
            match b {
                b'"' => {
                    self.pos = i + 1;
                    return Ok(match owned {
                        None => Cow::Borrowed(&src[start..i]),
                        Some(mut s) => {
                            s.push_str(&src[chunk_start..i]);
                            Cow::Owned(s)
                        }
                    });
                }
                b'\\' => {
                    let s = owned.get_or_insert_with(String::new);
                    s.push_str(&src[chunk_start..i]);
                    let escape = bytes.get(i + 1).copied();
                    i += 2;
                    match escape {
                        Some(b'"') => s.push('"'),
                        Some(b'\\') => s.push('\\'),
                        Some(b'/') => s.push('/'),
                        Some(b'b') => s.push('\u{8}'),
                        Some(b'f') => s.push('\u{c}'),
                        Some(b'n') => s.push('\n'),
                        Some(b'r') => s.push('\r'),
                        Some(b't') => s.push('\t'),
                        Some(b'u') => match unicode_escape(bytes, i) {
                            Some((ch, next)) => {
                                s.push(ch);
                                i = next;
                            }
                            None => {
                                self.pos = i;
                                return Err(self.error("invalid unicode escape"));
                            }
                        },
                        _ => {
                            self.pos = i;
                            return Err(self.error("invalid escape"));
                        }
                    }
                    chunk_start = i;
                }
                0x00..=0x1F => {
                    self.pos = i;
                    return Err(self.error("control character in string"));
                }
                _ => i += 1,
            }
        }
    }

    fn read_literal(&mut self) -> Result<Token<'a>> {
        let rest = &self.src[self.pos..];
        let (token, len) = if rest.starts_with("true") {
            (Token::Bool(true), 4)
        } else if rest.starts_with("false") {
            (Token::Bool(false), 5)
        } else if rest.starts_with("null") {
            (Token::Null, 4)
        } else {
            return Err(self.error("invalid literal"));
        };
        self.pos += len;
        Ok(token)
    }

    fn read_number(&mut self) -> Result<Token<'a>> {
        let bytes = self.src.as_bytes();
        let start = self.pos;
        let mut end = start;
        while matches!(
            bytes.get(end),
            Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
        ) {
            end += 1;
        }

        match serde_json::from_str::<Number>(&self.src[start..end]) {
            Ok(number) => {
                self.pos = end;
                Ok(Token::Number(number))
            }
            Err(_) => Err(self.error("invalid number")),
        }
    }
}

impl<'a> Iterator for JsonTokens<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            self.skip_whitespace();
            let Some(&c) = self.src.as_bytes().get(self.pos) else {
                if self.stack.is_empty() {
                    return None;
                }
                return Some(Err(self.error("unexpected end of input")));
            };

            let token = match c {
                b'{' => {
                    self.pos += 1;
                    self.stack.push(Container::Object);
                    self.expect_key = true;
                    Token::StartObject
                }
                b'[' => {
                    self.pos += 1;
                    self.stack.push(Container::Array);
                    self.expect_key = false;
                    Token::StartArray
                }
                b'}' | b']' => {
                    let (expected, token) = if c == b'}' {
                        (Container::Object, Token::EndObject)
                    } else {
                        (Container::Array, Token::EndArray)
                    };
                    if self.stack.pop() != Some(expected) {
                        return Some(Err(self.error("unbalanced bracket")));
                    }
                    self.pos += 1;
                    self.expect_key = false;
                    token
                }
                b',' => {
                    self.pos += 1;
                    self.expect_key = self.stack.last() == Some(&Container::Object);
                    continue;
                }
                b':' => {
                    self.pos += 1;
                    continue;
                }
                b'"' => {
                    let is_key = self.expect_key;
                    match self.read_string() {
                        Ok(s) => {
                            self.expect_key = false;
                            if is_key {
                                Token::PropertyName(s)
                            } else {
                                Token::String(s)
                            }
                        }
                        Err(e) => return Some(Err(e)),
                    }
                }
                b't' | b'f' | b'n' => match self.read_literal() {
                    Ok(token) => token,
                    Err(e) => return Some(Err(e)),
                },
                b'-' | b'0'..=b'9' => match self.read_number() {
                    Ok(token) => token,
                    Err(e) => return Some(Err(e)),
                },
                other => {
                    return Some(Err(
                        self.error(format!("unexpected character '{}'", other as char))
                    ))
                }
            };
            return Some(Ok(token));
        }
    }
}

/// Decode `XXXX` (and a following `\uXXXX` low surrogate) starting at `at`.
/// Returns the character and the offset after the escape.
fn unicode_escape(bytes: &[u8], at: usize) -> Option<(char, usize)> {
    let hi = hex4(bytes, at)?;
    if (0xD800..0xDC00).contains(&hi) {
        if bytes.get(at + 4) != Some(&b'\\') || bytes.get(at + 5) != Some(&b'u') {
            return None;
        }
        let lo = hex4(bytes, at + 6)?;
        if !(0xDC00..0xE000).contains(&lo) {
            return None;
        }
        let code = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
        return char::from_u32(code).map(|ch| (ch, at + 10));
    }
    char::from_u32(hi).map(|ch| (ch, at + 4))
}

fn hex4(bytes: &[u8], at: usize) -> Option<u32> {
    let digits = bytes.get(at..at + 4)?;
    digits.iter().try_fold(0u32, |acc, &d| {
        let v = (d as char).to_digit(16)?;
        Some(acc * 16 + v)
    })
}

/// Writes a flat object entry by entry. Keys are not deduplicated.
struct ObjectWriter<W: Write> {
    out: W,
    empty: bool,
}

impl<W: Write> ObjectWriter<W> {
    fn begin(mut out: W) -> Result<Self> {
        out.write_all(b"{")?;
        Ok(Self { out, empty: true })
    }

    fn entry(&mut self, key: &str, value: &Value) -> Result<()> {
        if !self.empty {
            self.out.write_all(b",")?;
        }
        self.empty = false;
        serde_json::to_writer(&mut self.out, key)
            .map_err(|e| FlattenError::Serialize(e.to_string()))?;
        self.out.write_all(b":")?;
        serde_json::to_writer(&mut self.out, value)
            .map_err(|e| FlattenError::Serialize(e.to_string()))?;
        Ok(())
    }

    fn finish(mut self) -> Result<W> {
        self.out.write_all(b"}")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Token-scanning flattener. See the module docs for how it differs from
/// [`crate::Flattener`].
#[derive(Debug, Clone)]
pub struct StreamingFlattener {
    display_name_property: String,
}

impl Default for StreamingFlattener {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_NAME_PROPERTY)
    }
}

impl StreamingFlattener {
    pub fn new(display_name_property: impl Into<String>) -> Self {
        Self {
            display_name_property: display_name_property.into(),
        }
    }

    /// Flatten `text` into a JSON object string.
    pub fn flatten(&self, text: &str) -> Result<String> {
        let out = self.flatten_to(text, Vec::new())?;
        String::from_utf8(out).map_err(|e| FlattenError::Serialize(e.to_string()))
    }

    /// Flatten `text`, writing the object to `out` as entries are found.
    pub fn flatten_to<W: Write>(&self, text: &str, out: W) -> Result<W> {
        let mut tokens = JsonTokens::new(text);
        let mut writer = ObjectWriter::begin(out)?;

        while scan_to_property(&mut tokens, &self.display_name_property)? {
            let Some(name) = tokens.next().transpose()? else {
                break;
            };
            let Some(key) = name.scalar_text() else {
                continue;
            };

            if scan_to_property(&mut tokens, VALUE_PROPERTY)?
                && scan_to_property(&mut tokens, VALUE_PROPERTY)?
            {
                if let Some(value) = tokens.next().transpose()? {
                    writer.entry(&key, &value.into_value())?;
                }
            }
        }

        writer.finish()
    }
}

/// Advance past the next property named `name`. `Ok(false)` at end of input.
fn scan_to_property(tokens: &mut JsonTokens<'_>, name: &str) -> Result<bool> {
    for token in tokens {
        if let Token::PropertyName(property) = token? {
            if property == name {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
