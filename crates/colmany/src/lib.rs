//! colmany - has-many relations resolved through id lists stored in parent columns.
//!
//! A parent row keeps the ids of its related rows in its own columns, either
//! as a delimited list (`"3,1,2"`) or inside a JSON / legacy serialized
//! document addressed with a dotted key (`meta.items.id`). This crate provides:
//!
//! - Single-parent loading that keeps the order the column lists ids in
//! - Batched eager loading with one query per batch of parents
//! - Correlated `EXISTS` sub-queries, including self-relations
//! - Lookup and write helpers that stamp the parent key on related rows
//!
//! # Quick Start
//!
//! ```ignore
//! use colmany::prelude::*;
//!
//! async fn load(cx: &Cx, conn: &impl Connection, posts: &mut [Post]) {
//!     let relation = column_many::<Post, Tag>(["tag_ids", "meta.extra.id"], Some("id"))?;
//!
//!     // One query for every post.
//!     relation.eager_load(cx, conn, posts, |p| &mut p.tags).await;
//!
//!     // Posts that list at least one tag.
//!     let parents = select!(Post);
//!     let tagged = parents.clone().filter(relation.has(&parents));
//! }
//! ```

pub mod decode;
pub mod dictionary;
pub mod existence;
pub mod keys;
pub mod legacy;
pub mod mutation;
pub mod relation;

pub use colmany_core::{
    // asupersync re-exports
    Cx,
    Outcome,
    // Core types
    Connection,
    DecodeError,
    DecodeErrorKind,
    Dialect,
    Error,
    Model,
    PersistenceError,
    RelatedMany,
    Result,
    Row,
    Value,
};

pub use colmany_query::{Expr, OrderBy, Select, persist, select};

pub use decode::{DecodeOptions, Encoding, decode_attribute};
pub use dictionary::Dictionary;
pub use existence::{RESERVED_ALIAS_PREFIX, reserved_alias};
pub use keys::{ForeignKey, KeySpec};
pub use mutation::Attributes;
pub use relation::{
    BoundColumnMany, ColumnMany, ConstraintMode, HasColumnMany, IntoLocalKeys, Relation,
    column_many,
};

/// Everything a caller usually needs in scope.
pub mod prelude {
    pub use crate::{
        BoundColumnMany, ColumnMany, Connection, ConstraintMode, Cx, DecodeOptions, Error, Expr,
        HasColumnMany, Model, Outcome, RelatedMany, Relation, Select, Value, column_many, select,
    };
}
