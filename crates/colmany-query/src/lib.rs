//! Statement building for colmany.
//!
//! Holds the predicate [`Expr`] tree, the [`Select`] builder relations use
//! to fetch related rows, and the INSERT/UPDATE builders behind
//! [`persist`]. Everything renders for the [`Dialect`] of the connection it
//! runs on.

pub mod builder;
pub mod clause;
pub mod expr;
pub mod select;

pub use builder::{InsertBuilder, UpdateBuilder, persist};
pub use clause::{OrderBy, OrderDirection, Where};
pub use expr::{BinaryOp, Dialect, Expr};
pub use select::Select;

/// Start a [`Select`] over a model's table.
///
/// # Example
///
/// ```ignore
/// let tags = select!(Tag)
///     .where_in("tags.id", [1_i64, 2, 3])
///     .all(cx, &conn)
///     .await;
/// ```
#[macro_export]
macro_rules! select {
    ($model:ty) => {
        $crate::Select::<$model>::new()
    };
}
