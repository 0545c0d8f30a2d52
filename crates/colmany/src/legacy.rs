//! Reader for the legacy serialized-blob format.
//!
//! Older rows store id lists in the PHP `serialize()` format, e.g.
//! `a:2:{i:0;i:5;i:1;i:9;}`. This module parses such blobs into the same
//! [`serde_json::Value`] tree the JSON path produces, so extraction only has
//! one document model to deal with.
//!
//! Supported tokens: `N;`, `b:`, `i:`, `d:`, `s:`, `a:` and `O:` (objects
//! become JSON objects keyed by property name). References (`r:`/`R:`) and
//! custom-serialized objects (`C:`) are rejected.

use serde_json::{Map, Number, Value as JsonValue};
use std::fmt;

/// Nesting limit for arrays and objects.
const MAX_DEPTH: usize = 64;

/// Where and why a blob failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyError {
    /// Byte offset into the input
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for LegacyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

impl std::error::Error for LegacyError {}

/// Parse a complete serialized blob. Trailing bytes are an error.
pub fn parse(input: &str) -> Result<JsonValue, LegacyError> {
    let mut reader = BlobReader::new(input.as_bytes());
    let value = reader.read_value(0)?;
    if !reader.is_empty() {
        return Err(reader.error("trailing data after value"));
    }
    Ok(value)
}

/// Cursor over a serialized blob.
#[derive(Debug)]
struct BlobReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BlobReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn error(&self, message: impl Into<String>) -> LegacyError {
        LegacyError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn read_u8(&mut self) -> Result<u8, LegacyError> {
        let byte = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<(), LegacyError> {
        let start = self.pos;
        let byte = self.read_u8()?;
        if byte == expected {
            Ok(())
        } else {
            Err(LegacyError {
                offset: start,
                message: format!("expected '{}', found '{}'", expected as char, byte as char),
            })
        }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], LegacyError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.error("string length runs past end of input"))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read up to (and consume) `terminator`, returning the text before it.
    fn read_until(&mut self, terminator: u8) -> Result<&'a str, LegacyError> {
        let start = self.pos;
        let len = self.data[start..]
            .iter()
            .position(|b| *b == terminator)
            .ok_or_else(|| self.error(format!("missing '{}'", terminator as char)))?;
        self.pos = start + len + 1;
        std::str::from_utf8(&self.data[start..start + len]).map_err(|_| LegacyError {
            offset: start,
            message: "invalid UTF-8".to_string(),
        })
    }

    fn read_int(&mut self, terminator: u8) -> Result<i64, LegacyError> {
        let start = self.pos;
        let text = self.read_until(terminator)?;
        text.parse().map_err(|_| LegacyError {
            offset: start,
            message: format!("invalid integer '{text}'"),
        })
    }

    fn read_len(&mut self, terminator: u8) -> Result<usize, LegacyError> {
        let start = self.pos;
        let n = self.read_int(terminator)?;
        usize::try_from(n).map_err(|_| LegacyError {
            offset: start,
            message: format!("negative length {n}"),
        })
    }

    /// `len:"bytes"`, positioned after the type tag's colon.
    fn read_quoted(&mut self) -> Result<String, LegacyError> {
        let len = self.read_len(b':')?;
        self.expect(b'"')?;
        let start = self.pos;
        let bytes = self.read_bytes(len)?;
        self.expect(b'"')?;
        String::from_utf8(bytes.to_vec()).map_err(|_| LegacyError {
            offset: start,
            message: "invalid UTF-8 in string".to_string(),
        })
    }

    fn read_value(&mut self, depth: usize) -> Result<JsonValue, LegacyError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        let tag_pos = self.pos;
        let tag = self.read_u8()?;
        if tag == b'N' {
            self.expect(b';')?;
            return Ok(JsonValue::Null);
        }
        self.expect(b':')?;

        match tag {
            b'b' => match self.read_int(b';')? {
                0 => Ok(JsonValue::Bool(false)),
                1 => Ok(JsonValue::Bool(true)),
                other => Err(LegacyError {
                    offset: tag_pos,
                    message: format!("invalid boolean {other}"),
                }),
            },
            b'i' => Ok(JsonValue::from(self.read_int(b';')?)),
            b'd' => {
                let start = self.pos;
                let text = self.read_until(b';')?;
                text.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(JsonValue::Number)
                    .ok_or_else(|| LegacyError {
                        offset: start,
                        message: format!("invalid float '{text}'"),
                    })
            }
            b's' => {
                let s = self.read_quoted()?;
                self.expect(b';')?;
                Ok(JsonValue::String(s))
            }
            b'a' => {
                let count = self.read_len(b':')?;
                self.read_members(count, depth)
            }
            b'O' => {
                // Class name is dropped; properties become a plain object.
                let _class = self.read_quoted()?;
                self.expect(b':')?;
                let count = self.read_len(b':')?;
                match self.read_members(count, depth)? {
                    JsonValue::Array(items) => Ok(JsonValue::Object(
                        items
                            .into_iter()
                            .enumerate()
                            .map(|(i, v)| (i.to_string(), v))
                            .collect(),
                    )),
                    other => Ok(other),
                }
            }
            other => Err(LegacyError {
                offset: tag_pos,
                message: format!("unsupported type tag '{}'", other as char),
            }),
        }
    }

    /// `{key;value;...}` with `count` pairs.
    ///
    /// Keys `0..count` in order produce a JSON array; anything else an object.
    fn read_members(&mut self, count: usize, depth: usize) -> Result<JsonValue, LegacyError> {
        self.expect(b'{')?;
        let mut members: Vec<(String, JsonValue)> = Vec::with_capacity(count.min(1024));
        let mut sequential = true;

        for index in 0..count {
            let key = match self.read_value(depth + 1)? {
                JsonValue::Number(n) => {
                    sequential &= n.as_u64() == Some(index as u64);
                    n.to_string()
                }
                JsonValue::String(s) => {
                    sequential = false;
                    property_name(&s).to_string()
                }
                _ => return Err(self.error("array key must be an integer or string")),
            };
            let value = self.read_value(depth + 1)?;
            members.push((key, value));
        }
        self.expect(b'}')?;

        if sequential {
            Ok(JsonValue::Array(members.into_iter().map(|(_, v)| v).collect()))
        } else {
            let map: Map<String, JsonValue> = members.into_iter().collect();
            Ok(JsonValue::Object(map))
        }
    }
}

/// Strip the NUL-delimited visibility prefix from private/protected property names.
fn property_name(key: &str) -> &str {
    match key.strip_prefix('\0') {
        Some(rest) => rest.split_once('\0').map_or(rest, |(_, name)| name),
        None => key,
    }
}
