//! Local and foreign key specifiers.

use colmany_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A local key specifier: a parent column, optionally followed by a dotted
/// path into the column's encoded document.
///
/// `tag_ids` names a plain delimited column. `meta.items.id` names the
/// `meta` column and extracts `items.id` from every element of its decoded
/// top-level collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeySpec {
    raw: String,
    column: String,
    path: Vec<String>,
}

impl KeySpec {
    /// Parse a specifier. Empty specifiers and empty path segments are rejected.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let mut segments = spec.split('.');
        let column = segments.next().unwrap_or_default();
        let path: Vec<String> = segments.map(str::to_string).collect();

        if column.is_empty() || path.iter().any(String::is_empty) {
            return Err(Error::Custom(format!("invalid local key specifier '{spec}'")));
        }

        Ok(Self {
            raw: spec.to_string(),
            column: column.to_string(),
            path,
        })
    }

    /// The parent column holding the encoded ids.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Path applied to each element of the decoded document (column stripped).
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Whether the column holds a document rather than a delimited list.
    pub fn is_dotted(&self) -> bool {
        !self.path.is_empty()
    }

    /// The specifier as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for KeySpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The related model's foreign key column, qualified with its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    table: String,
    column: String,
}

impl ForeignKey {
    /// Build from a column that may already be qualified (`table.column`).
    ///
    /// Unqualified names are qualified with `default_table`.
    pub fn new(column: &str, default_table: &str) -> Self {
        match column.rsplit_once('.') {
            Some((table, column)) => Self {
                table: table.to_string(),
                column: column.to_string(),
            },
            None => Self {
                table: default_table.to_string(),
                column: column.to_string(),
            },
        }
    }

    /// The bare column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The table the column belongs to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// `table.column`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }

    /// The column qualified with some other table name or alias.
    pub fn qualified_with(&self, table: &str) -> String {
        format!("{table}.{}", self.column)
    }
}
