//! Storage-facing types shared by the colmany crates.
//!
//! Relations never touch a driver directly. They read parent attributes
//! through [`Model`], fetch [`Row`]s through [`Connection`], and write the
//! resolved collection into a [`RelatedMany`] slot. All async work runs
//! under an asupersync [`Cx`] and resolves to an [`Outcome`].

pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod error;
pub mod model;
pub mod relationship;
pub mod row;
pub mod value;

pub use connection::{Connection, Dialect};
pub use error::{
    ConnectionError, ConnectionErrorKind, DecodeError, DecodeErrorKind, Error, PersistenceError,
    QueryError, QueryErrorKind, Result, TypeError,
};
pub use model::Model;
pub use relationship::RelatedMany;
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;
