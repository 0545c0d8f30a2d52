//! Errors raised while loading or writing relations.

use std::fmt;

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum Error {
    /// The connection itself failed
    Connection(ConnectionError),
    /// The database rejected a statement
    Query(QueryError),
    /// A column could not be converted to the requested Rust type
    Type(TypeError),
    /// A stored id list could not be decoded
    Decode(DecodeError),
    /// Saving or creating a model failed
    Persistence(PersistenceError),
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<BoxedCause>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    Connect,
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    /// Statement text, when the driver reports it
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<BoxedCause>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    Syntax,
    /// Unique, foreign key or check violation
    Constraint,
    /// Unknown table or column
    NotFound,
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

/// A parent column value that does not decode under its key specifier.
///
/// The stored data itself is wrong, so the same call fails the same way
/// every time.
#[derive(Debug, Clone)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    /// The local key specifier being decoded (e.g. `tag_ids` or `meta.items.id`)
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// A delimited list segment is not an integer
    InvalidSegment,
    /// Neither JSON nor the legacy serialized format could parse the value
    Malformed,
    /// The decoded document is a scalar, not an array or object
    NotACollection,
    /// The dotted path matched nothing in a non-empty collection
    PathNotFound,
    /// An extracted value cannot be coerced to an integer
    NotAnInteger,
    /// The column value has a type that cannot hold an id list
    UnsupportedValue,
}

#[derive(Debug)]
pub struct PersistenceError {
    /// Table the failed write targeted
    pub table: &'static str,
    pub message: String,
    pub source: Option<BoxedCause>,
}

impl Error {
    pub fn decode(kind: DecodeErrorKind, key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Decode(DecodeError {
            kind,
            key: key.into(),
            message: message.into(),
        })
    }

    /// Wrap a failed write against `table`, keeping `cause` as the source.
    pub fn persistence(table: &'static str, cause: Error) -> Self {
        Error::Persistence(PersistenceError {
            table,
            message: cause.to_string(),
            source: Some(Box::new(cause)),
        })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => match &e.sql {
                Some(sql) => write!(f, "Query error: {} (in `{sql}`)", e.message),
                None => write!(f, "Query error: {}", e.message),
            },
            Error::Type(e) => write!(f, "Type error: {e}"),
            Error::Decode(e) => write!(f, "Decode error: {e}"),
            Error::Persistence(e) => write!(f, "Persistence error: {e}"),
            Error::Custom(msg) => f.write_str(msg),
        }
    }
}

fn as_source(cause: Option<&BoxedCause>) -> Option<&(dyn std::error::Error + 'static)> {
    cause.map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => as_source(e.source.as_ref()),
            Error::Query(e) => as_source(e.source.as_ref()),
            Error::Persistence(e) => as_source(e.source.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}", self.expected)?;
        if let Some(column) = &self.column {
            write!(f, " for column '{column}'")?;
        }
        write!(f, ", found {}", self.actual)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot decode key '{}': {}", self.key, self.message)
    }
}

impl std::error::Error for DecodeError {}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "write to '{}' failed: {}", self.table, self.message)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::Decode(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn decode_error_display_names_key() {
        let err = Error::decode(DecodeErrorKind::InvalidSegment, "tag_ids", "'x' is not an integer");
        assert!(err.is_decode());
        assert!(!err.is_persistence());
        assert_eq!(
            err.to_string(),
            "Decode error: cannot decode key 'tag_ids': 'x' is not an integer"
        );
    }

    #[test]
    fn persistence_error_keeps_cause() {
        let cause = Error::Query(QueryError {
            kind: QueryErrorKind::Constraint,
            sql: Some("INSERT INTO tags (name) VALUES ($1)".to_string()),
            message: "unique violation".to_string(),
            source: None,
        });
        let err = Error::persistence("tags", cause);
        assert!(err.is_persistence());
        assert!(err.to_string().contains("write to 'tags' failed"));
        let source = err.source().expect("cause retained");
        assert!(source.to_string().contains("unique violation"));
        assert!(source.to_string().contains("INSERT INTO tags"));
    }

    #[test]
    fn type_error_mentions_column_when_known() {
        let err = TypeError {
            expected: "i64",
            actual: "TEXT".into(),
            column: Some("tag_ids".into()),
        };
        assert_eq!(err.to_string(), "expected i64 for column 'tag_ids', found TEXT");
    }
}
