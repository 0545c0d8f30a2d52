//! Model trait for ORM-style struct mapping.
//!
//! The `Model` trait defines the contract between a Rust struct and a
//! database table: table metadata, conversion to and from rows, and
//! name-based attribute access. Relations only ever read and write models
//! through this trait.

use crate::Result;
use crate::row::Row;
use crate::value::Value;

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// use colmany_core::{Model, Row, Value, Result, Error};
///
/// #[derive(Debug, Clone, Default)]
/// struct Post {
///     id: Option<i64>,
///     tag_ids: Option<String>,
/// }
///
/// impl Model for Post {
///     const TABLE_NAME: &'static str = "posts";
///     const PRIMARY_KEY: &'static str = "id";
///
///     fn to_row(&self) -> Vec<(&'static str, Value)> {
///         vec![("id", self.id.into()), ("tag_ids", self.tag_ids.clone().into())]
///     }
///
///     fn from_row(row: &Row) -> Result<Self> {
///         Ok(Self { id: row.get_named("id")?, tag_ids: row.get_named("tag_ids")? })
///     }
///
///     fn set_attribute(&mut self, column: &str, value: Value) -> Result<()> {
///         match column {
///             "id" => self.id = value.as_i64(),
///             "tag_ids" => self.tag_ids = value.as_str().map(str::to_string),
///             _ => return Err(Error::Custom(format!("unknown column {column}"))),
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Model: Sized + Send + Sync {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column name.
    const PRIMARY_KEY: &'static str;

    /// Convert this model instance to a row of values.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct a model instance from a database row.
    fn from_row(row: &Row) -> Result<Self>;

    /// Write a single attribute by column name.
    fn set_attribute(&mut self, column: &str, value: Value) -> Result<()>;

    /// Read a single attribute by column name.
    ///
    /// Unknown columns read as NULL.
    fn get_attribute(&self, column: &str) -> Value {
        self.to_row()
            .into_iter()
            .find(|(name, _)| *name == column)
            .map_or(Value::Null, |(_, value)| value)
    }

    /// Get the value of the primary key.
    fn primary_key_value(&self) -> Value {
        self.get_attribute(Self::PRIMARY_KEY)
    }

    /// Check if this is a new record (primary key is NULL).
    fn is_new(&self) -> bool {
        self.primary_key_value().is_null()
    }

    /// Write several attributes in order.
    fn fill<'a>(&mut self, attributes: impl IntoIterator<Item = (&'a str, Value)>) -> Result<()> {
        for (column, value) in attributes {
            self.set_attribute(column, value)?;
        }
        Ok(())
    }

    /// Create a new, unsaved instance filled with `attributes`.
    fn new_instance<'a>(attributes: impl IntoIterator<Item = (&'a str, Value)>) -> Result<Self>
    where
        Self: Default,
    {
        let mut instance = Self::default();
        instance.fill(attributes)?;
        Ok(instance)
    }

    /// Qualify a column with this model's table name.
    ///
    /// Already qualified names are returned unchanged.
    fn qualify_column(column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{}", Self::TABLE_NAME, column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Tag {
        id: Option<i64>,
        post_id: Option<i64>,
        name: String,
    }

    impl Model for Tag {
        const TABLE_NAME: &'static str = "tags";
        const PRIMARY_KEY: &'static str = "id";

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("id", self.id.into()),
                ("post_id", self.post_id.into()),
                ("name", Value::Text(self.name.clone())),
            ]
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get_named("id")?,
                post_id: row.get_named("post_id")?,
                name: row.get_named("name")?,
            })
        }

        fn set_attribute(&mut self, column: &str, value: Value) -> Result<()> {
            match column {
                "id" => self.id = value.as_i64(),
                "post_id" => self.post_id = value.as_i64(),
                "name" => self.name = value.as_str().unwrap_or_default().to_string(),
                other => return Err(Error::Custom(format!("unknown column {other}"))),
            }
            Ok(())
        }
    }

    #[test]
    fn new_instance_is_new_and_filled() {
        let tag = Tag::new_instance([("name", Value::from("rust")), ("post_id", Value::BigInt(3))])
            .unwrap();
        assert!(tag.is_new());
        assert_eq!(tag.name, "rust");
        assert_eq!(tag.get_attribute("post_id"), Value::BigInt(3));
        assert_eq!(tag.get_attribute("nope"), Value::Null);
    }

    #[test]
    fn fill_rejects_unknown_column() {
        let mut tag = Tag::default();
        assert!(tag.fill([("color", Value::from("red"))]).is_err());
    }

    #[test]
    fn qualify_column_only_once() {
        assert_eq!(Tag::qualify_column("post_id"), "tags.post_id");
        assert_eq!(Tag::qualify_column("other.post_id"), "other.post_id");
    }

    #[test]
    fn primary_key_roundtrip() {
        let mut tag = Tag::default();
        tag.set_attribute("id", Value::BigInt(9)).unwrap();
        assert_eq!(tag.primary_key_value(), Value::BigInt(9));
        assert!(!tag.is_new());
    }
}
