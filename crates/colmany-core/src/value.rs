//! Column values as relations see them.
//!
//! Parent id-list columns arrive in many shapes (text, integers, native
//! JSON), so [`Value`] keeps the storage type and offers the few readings a
//! relation needs: blank detection, integer keys and text.

/// One column value, parameter or attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Native JSON column
    Json(serde_json::Value),
    /// Renders as the SQL `DEFAULT` keyword
    Default,
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for values that hold no id at all.
    ///
    /// NULL (SQL or JSON), whitespace-only text and whitespace-only bytes
    /// are blank. Numbers, booleans and JSON collections never are.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null | Value::Json(serde_json::Value::Null) => true,
            Value::Text(s) | Value::Json(serde_json::Value::String(s)) => s.trim().is_empty(),
            Value::Bytes(b) => b.iter().all(u8::is_ascii_whitespace),
            _ => false,
        }
    }

    /// SQL-ish name of the stored type, for error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Json(_) => "JSON",
            Value::Default => "DEFAULT",
        }
    }

    /// Strict integer reading: integer and boolean storage only.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v.into()),
            Value::BigInt(v) => Some(v),
            Value::Bool(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Lenient integer reading used for key matching.
    ///
    /// Also accepts trimmed numeric text and JSON integers, since keys are
    /// often read back from loosely typed columns.
    pub fn as_key(&self) -> Option<i64> {
        match self {
            Value::Int(_) | Value::BigInt(_) => self.as_i64(),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Json(serde_json::Value::Number(n)) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::Text(s) = self {
            Some(s)
        } else {
            None
        }
    }
}

macro_rules! impl_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int,
    i64 => BigInt,
    f64 => Double,
    String => Text,
    Vec<u8> => Bytes,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
