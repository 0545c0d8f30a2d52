//! Correlated existence sub-queries (`has` / `where_has`).
//!
//! The sub-query correlates the parent's first local key column with the
//! related foreign key. When both sides live in the same table the related
//! side is re-aliased so the correlation can tell them apart.

use crate::relation::ColumnMany;
use colmany_core::Model;
use colmany_query::{Expr, Select};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Prefix of the synthetic aliases given to self-relation sub-queries.
pub const RESERVED_ALIAS_PREFIX: &str = "colmany_reserved_";

static ALIAS_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A process-unique table alias (`colmany_reserved_N`).
pub fn reserved_alias() -> String {
    let n = ALIAS_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{RESERVED_ALIAS_PREFIX}{n}")
}

impl<P: Model, R: Model> ColumnMany<P, R> {
    /// The related column compared against the parent in existence queries.
    pub fn existence_compare_key(&self) -> String {
        self.foreign_key().qualified()
    }

    /// The parent column existence queries correlate on.
    ///
    /// Always the first local key's column, qualified with the table the
    /// parent query reads from.
    pub fn qualified_parent_key(&self, parent_query: &Select<P>) -> String {
        let column = self
            .local_keys()
            .first()
            .map_or(P::PRIMARY_KEY, |key| key.column());
        format!("{}.{column}", parent_query.table_ref())
    }

    /// Related query correlated with `parent_query`, for use inside EXISTS.
    pub fn existence_query(&self, parent_query: &Select<P>) -> Select<R> {
        let parent_key = self.qualified_parent_key(parent_query);

        if parent_query.table_ref() == R::TABLE_NAME {
            let alias = reserved_alias();
            tracing::trace!(alias = %alias, table = R::TABLE_NAME, "Aliasing self-relation");
            let related_key = self.foreign_key().qualified_with(&alias);
            return self
                .related_query()
                .from_alias(alias)
                .where_column(&parent_key, &related_key);
        }

        self.related_query()
            .where_column(&parent_key, &self.existence_compare_key())
    }

    /// `EXISTS (...)` for parents with at least one related row.
    pub fn has(&self, parent_query: &Select<P>) -> Expr {
        self.existence_query(parent_query).into_exists()
    }

    /// `NOT EXISTS (...)` for parents without related rows.
    pub fn doesnt_have(&self, parent_query: &Select<P>) -> Expr {
        self.existence_query(parent_query).into_not_exists()
    }

    /// `EXISTS (...)` with extra conditions on the related rows.
    ///
    /// `constrain` receives the correlated query; use its
    /// [`table_ref`](Select::table_ref) to qualify columns, since
    /// self-relations read through an alias.
    pub fn where_has<F>(&self, parent_query: &Select<P>, constrain: F) -> Expr
    where
        F: FnOnce(Select<R>) -> Select<R>,
    {
        constrain(self.existence_query(parent_query)).into_exists()
    }
}
