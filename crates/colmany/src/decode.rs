//! Decoding parent column values into ordered id lists.
//!
//! A plain local key (`tag_ids`) holds a delimited list such as `"3,1,2"`.
//! A dotted local key (`meta.items.id`) holds a document (JSON, or the
//! legacy serialized format) and the path after the column name is applied
//! to every element of the document's top-level collection.
//!
//! Decoding never deduplicates; callers decide how repeated ids are used.

use crate::keys::KeySpec;
use crate::legacy;
use colmany_core::{DecodeErrorKind, Error, Result, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Decoder settings attached to a relation.
///
/// Deserializable so it can sit inside application config; missing fields
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Separator for plain delimited columns.
    pub delimiter: char,
    /// Try the legacy serialized format when a dotted column is not JSON.
    pub legacy_fallback: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            legacy_fallback: true,
        }
    }
}

impl DecodeOptions {
    /// Use `delimiter` for plain columns.
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Enable or disable the legacy serialized-format fallback.
    pub fn legacy_fallback(mut self, enabled: bool) -> Self {
        self.legacy_fallback = enabled;
        self
    }
}

/// Document encodings understood for dotted keys, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Legacy,
}

impl Encoding {
    /// Strategies enabled by `options`, in trial order.
    pub fn candidates(options: &DecodeOptions) -> &'static [Encoding] {
        if options.legacy_fallback {
            &[Encoding::Json, Encoding::Legacy]
        } else {
            &[Encoding::Json]
        }
    }

    fn parse(self, text: &str) -> Option<JsonValue> {
        match self {
            Encoding::Json => serde_json::from_str(text).ok(),
            Encoding::Legacy => legacy::parse(text).ok(),
        }
    }
}

/// Decode one column value under `key` into an ordered list of ids.
///
/// Blank values (NULL, empty text, empty bytes) and a bare zero (`0` or
/// `"0"`) yield no ids.
pub fn decode_attribute(value: &Value, key: &KeySpec, options: &DecodeOptions) -> Result<Vec<i64>> {
    if value.is_blank() || is_zero(value) {
        return Ok(Vec::new());
    }

    let result = if key.is_dotted() {
        decode_document(value, key, options)
    } else {
        decode_delimited(value, key, options)
    };

    if let Err(e) = &result {
        tracing::debug!(key = %key, column = key.column(), error = %e, "Failed to decode local key");
    }
    result
}

/// A bare zero marks an unset column.
fn is_zero(value: &Value) -> bool {
    match value {
        Value::Int(0) | Value::BigInt(0) => true,
        Value::Text(text) | Value::Json(JsonValue::String(text)) => text == "0",
        Value::Json(JsonValue::Number(n)) => n.as_i64() == Some(0),
        _ => false,
    }
}

fn decode_delimited(value: &Value, key: &KeySpec, options: &DecodeOptions) -> Result<Vec<i64>> {
    match value {
        Value::Int(_) | Value::BigInt(_) => Ok(value.as_i64().into_iter().collect()),
        Value::Text(text) => split_list(text, key, options.delimiter),
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => split_list(text, key, options.delimiter),
            Err(_) => Err(Error::decode(
                DecodeErrorKind::UnsupportedValue,
                key.as_str(),
                "binary value is not valid UTF-8",
            )),
        },
        Value::Json(JsonValue::String(text)) => split_list(text, key, options.delimiter),
        Value::Json(json @ (JsonValue::Number(_) | JsonValue::Array(_))) => {
            let mut ids = Vec::new();
            coerce_into(json, key, &mut ids)?;
            Ok(ids)
        }
        other => Err(Error::decode(
            DecodeErrorKind::UnsupportedValue,
            key.as_str(),
            format!("{} value cannot hold an id list", other.type_name()),
        )),
    }
}

fn split_list(text: &str, key: &KeySpec, delimiter: char) -> Result<Vec<i64>> {
    text.split(delimiter)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment.parse::<i64>().map_err(|_| {
                Error::decode(
                    DecodeErrorKind::InvalidSegment,
                    key.as_str(),
                    format!("'{segment}' is not an integer"),
                )
            })
        })
        .collect()
}

fn decode_document(value: &Value, key: &KeySpec, options: &DecodeOptions) -> Result<Vec<i64>> {
    let parsed;
    let document = match value {
        Value::Json(json) => json,
        Value::Text(text) => {
            parsed = parse_document(text, key, options)?;
            &parsed
        }
        Value::Bytes(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                Error::decode(
                    DecodeErrorKind::Malformed,
                    key.as_str(),
                    "binary value is not valid UTF-8",
                )
            })?;
            parsed = parse_document(text, key, options)?;
            &parsed
        }
        other => {
            return Err(Error::decode(
                DecodeErrorKind::UnsupportedValue,
                key.as_str(),
                format!("{} value cannot hold a document", other.type_name()),
            ));
        }
    };

    extract_ids(document, key)
}

fn parse_document(text: &str, key: &KeySpec, options: &DecodeOptions) -> Result<JsonValue> {
    Encoding::candidates(options)
        .iter()
        .find_map(|encoding| encoding.parse(text))
        .ok_or_else(|| {
            Error::decode(
                DecodeErrorKind::Malformed,
                key.as_str(),
                "value is neither JSON nor a serialized blob",
            )
        })
}

/// Apply the key's path to every element of the top-level collection.
fn extract_ids(document: &JsonValue, key: &KeySpec) -> Result<Vec<i64>> {
    let elements: Vec<&JsonValue> = match document {
        JsonValue::Array(items) => items.iter().collect(),
        JsonValue::Object(map) => map.values().collect(),
        other => {
            return Err(Error::decode(
                DecodeErrorKind::NotACollection,
                key.as_str(),
                format!("top-level value is {}", json_type(other)),
            ));
        }
    };

    let mut found = Vec::new();
    for element in &elements {
        walk(element, key.path(), &mut found);
    }

    if found.is_empty() && !elements.is_empty() {
        return Err(Error::decode(
            DecodeErrorKind::PathNotFound,
            key.as_str(),
            format!("path '{}' matched no element", key.path().join(".")),
        ));
    }

    let mut ids = Vec::new();
    for value in found {
        coerce_into(value, key, &mut ids)?;
    }
    Ok(ids)
}

/// Collect every value reachable from `node` along `path`. `*` fans out.
fn walk<'v>(node: &'v JsonValue, path: &[String], out: &mut Vec<&'v JsonValue>) {
    let Some((segment, rest)) = path.split_first() else {
        out.push(node);
        return;
    };

    match node {
        JsonValue::Array(items) if segment == "*" => {
            for item in items {
                walk(item, rest, out);
            }
        }
        JsonValue::Object(map) if segment == "*" => {
            for item in map.values() {
                walk(item, rest, out);
            }
        }
        JsonValue::Array(items) => {
            if let Some(item) = segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                walk(item, rest, out);
            }
        }
        JsonValue::Object(map) => {
            if let Some(item) = map.get(segment.as_str()) {
                walk(item, rest, out);
            }
        }
        _ => {}
    }
}

/// Coerce an extracted value to ids, flattening nested arrays.
fn coerce_into(value: &JsonValue, key: &KeySpec, ids: &mut Vec<i64>) -> Result<()> {
    match value {
        JsonValue::Null => {}
        JsonValue::Bool(b) => ids.push(i64::from(*b)),
        JsonValue::Number(n) => {
            let id = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .ok_or_else(|| not_an_integer(key, value))?;
            ids.push(id);
        }
        JsonValue::String(s) => {
            let s = s.trim();
            let id = s
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .ok_or_else(|| not_an_integer(key, value))?;
            ids.push(id);
        }
        JsonValue::Array(items) => {
            for item in items {
                coerce_into(item, key, ids)?;
            }
        }
        JsonValue::Object(_) => return Err(not_an_integer(key, value)),
    }
    Ok(())
}

fn not_an_integer(key: &KeySpec, value: &JsonValue) -> Error {
    Error::decode(
        DecodeErrorKind::NotAnInteger,
        key.as_str(),
        format!("{value} is not an integer"),
    )
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
