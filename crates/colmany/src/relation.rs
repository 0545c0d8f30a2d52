//! The column-many relation.
//!
//! A parent row lists related ids in one or more of its own columns; the
//! relation fetches the related rows whose foreign key is among those ids
//! and hands each parent its rows in the order its column lists them.
//!
//! # Example
//!
//! ```ignore
//! use colmany::{column_many, HasColumnMany};
//!
//! // posts.tag_ids = "3,1,2"
//! let tags = post.has_column_many::<Tag>("tag_ids", Some("id"))?
//!     .get_results(&cx, &conn)
//!     .await;
//!
//! // One query for the whole batch.
//! let relation = column_many::<Post, Tag>("tag_ids", Some("id"))?;
//! relation.eager_load(&cx, &conn, &mut posts, |p| &mut p.tags).await;
//! ```

use crate::decode::{DecodeOptions, decode_attribute};
use crate::dictionary::{Dictionary, sort_by_id_order, unique_ids};
use crate::keys::{ForeignKey, KeySpec};
use asupersync::{Cx, Outcome};
use colmany_core::{Connection, Error, Model, RelatedMany, Result};
use colmany_query::Select;
use std::fmt;
use std::marker::PhantomData;

/// Whether single-parent constraints are added to a relation query.
///
/// `Skip` leaves the query unconstrained, for callers that build their own
/// predicate (existence sub-queries, eager batches).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConstraintMode {
    #[default]
    Apply,
    Skip,
}

/// Local key specifiers accepted by [`column_many`].
pub trait IntoLocalKeys {
    fn into_local_keys(self) -> Result<Vec<KeySpec>>;
}

impl IntoLocalKeys for &str {
    fn into_local_keys(self) -> Result<Vec<KeySpec>> {
        Ok(vec![KeySpec::parse(self)?])
    }
}

impl IntoLocalKeys for String {
    fn into_local_keys(self) -> Result<Vec<KeySpec>> {
        self.as_str().into_local_keys()
    }
}

impl IntoLocalKeys for &[&str] {
    fn into_local_keys(self) -> Result<Vec<KeySpec>> {
        self.iter().map(|spec| KeySpec::parse(spec)).collect()
    }
}

impl<const N: usize> IntoLocalKeys for [&str; N] {
    fn into_local_keys(self) -> Result<Vec<KeySpec>> {
        self.as_slice().into_local_keys()
    }
}

impl IntoLocalKeys for Vec<&str> {
    fn into_local_keys(self) -> Result<Vec<KeySpec>> {
        self.as_slice().into_local_keys()
    }
}

impl IntoLocalKeys for Vec<KeySpec> {
    fn into_local_keys(self) -> Result<Vec<KeySpec>> {
        Ok(self)
    }
}

/// The capability set every relation exposes to the loader.
///
/// Constraint builders take the query by value and hand it back with the
/// relation's predicate added, so callers can keep chaining.
pub trait Relation {
    type Parent: Model;
    type Related: Model;

    /// Constrain `query` to the related rows of a single parent.
    fn add_constraints(
        &self,
        query: Select<Self::Related>,
        parent: &Self::Parent,
        mode: ConstraintMode,
    ) -> Result<Select<Self::Related>>;

    /// Constrain `query` to the related rows of a whole batch of parents.
    fn add_eager_constraints(
        &self,
        query: Select<Self::Related>,
        parents: &[Self::Parent],
    ) -> Result<Select<Self::Related>>;

    /// Give every parent an empty, loaded relation collection.
    fn init_relation<F>(&self, parents: &mut [Self::Parent], slot: F)
    where
        F: Fn(&mut Self::Parent) -> &mut RelatedMany<Self::Related>;

    /// Distribute one batch of fetched rows over their parents.
    fn match_eager<F>(
        &self,
        parents: &mut [Self::Parent],
        results: Vec<Self::Related>,
        slot: F,
    ) -> Result<()>
    where
        Self::Related: Clone,
        F: Fn(&mut Self::Parent) -> &mut RelatedMany<Self::Related>;

    /// Fetch a single parent's related rows in its column order.
    ///
    /// Rows are placed by their foreign-key value, the same column the
    /// query filters on, not by their primary key. Rows whose key is not
    /// listed are dropped.
    fn get_results<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        parent: &Self::Parent,
    ) -> impl Future<Output = Outcome<Vec<Self::Related>, Error>>;
}

/// Relation descriptor: parent `P` lists ids of related `R` in its columns.
///
/// The descriptor is immutable and holds no parent; bind it with
/// [`ColumnMany::bind`] for single-parent use.
pub struct ColumnMany<P, R> {
    local_keys: Vec<KeySpec>,
    foreign_key: ForeignKey,
    options: DecodeOptions,
    _marker: PhantomData<fn() -> (P, R)>,
}

/// Create a column-many relation from parent `P` to related `R`.
///
/// `foreign_key` names the related column holding one id; it defaults to the
/// parent's primary key column name and is qualified with `R`'s table.
pub fn column_many<P: Model, R: Model>(
    local_keys: impl IntoLocalKeys,
    foreign_key: Option<&str>,
) -> Result<ColumnMany<P, R>> {
    let local_keys = local_keys.into_local_keys()?;
    let foreign_key = ForeignKey::new(foreign_key.unwrap_or(P::PRIMARY_KEY), R::TABLE_NAME);
    ColumnMany::new(local_keys, foreign_key)
}

impl<P: Model, R: Model> ColumnMany<P, R> {
    /// Build a descriptor. At least one local key is required.
    pub fn new(local_keys: Vec<KeySpec>, foreign_key: ForeignKey) -> Result<Self> {
        if local_keys.is_empty() {
            return Err(Error::Custom(format!(
                "column-many relation {} -> {} needs at least one local key",
                P::TABLE_NAME,
                R::TABLE_NAME
            )));
        }
        Ok(Self {
            local_keys,
            foreign_key,
            options: DecodeOptions::default(),
            _marker: PhantomData,
        })
    }

    /// Replace the decoder settings.
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn local_keys(&self) -> &[KeySpec] {
        &self.local_keys
    }

    pub fn foreign_key(&self) -> &ForeignKey {
        &self.foreign_key
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Bind to a single parent.
    pub fn bind<'p>(&self, parent: &'p P) -> BoundColumnMany<'p, P, R> {
        BoundColumnMany {
            relation: self.clone(),
            parent,
        }
    }

    /// Decode every local key of `parent`, in key order, repeats kept.
    pub fn parent_ids(&self, parent: &P) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        for key in &self.local_keys {
            let value = parent.get_attribute(key.column());
            ids.extend(decode_attribute(&value, key, &self.options)?);
        }
        Ok(ids)
    }

    /// Distinct ids across a batch of parents, first occurrence kept.
    pub fn batch_ids(&self, parents: &[P]) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        for parent in parents {
            ids.extend(self.parent_ids(parent)?);
        }
        Ok(unique_ids(&ids))
    }

    /// A fresh, unconstrained query for the related model.
    pub fn related_query(&self) -> Select<R> {
        colmany_query::select!(R)
    }

    /// Load the relation for a batch of parents with one query.
    ///
    /// No query runs when no parent lists any id. Slots are only written
    /// once the ids decode and the query succeeds; on failure every slot
    /// keeps its previous state.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, conn, parents, slot),
        fields(parent = P::TABLE_NAME, related = R::TABLE_NAME, parents = parents.len())
    )]
    pub async fn eager_load<C, F>(
        &self,
        cx: &Cx,
        conn: &C,
        parents: &mut [P],
        slot: F,
    ) -> Outcome<(), Error>
    where
        C: Connection,
        R: Clone,
        F: Fn(&mut P) -> &mut RelatedMany<R>,
    {
        let ids = match self.batch_ids(parents) {
            Ok(ids) => ids,
            Err(e) => return Outcome::Err(e),
        };
        if ids.is_empty() {
            tracing::debug!("No ids listed; skipping query");
            self.init_relation(parents, &slot);
            return Outcome::Ok(());
        }
        tracing::debug!(ids = ids.len(), "Eager loading column-many relation");

        let query = self
            .related_query()
            .where_in(&self.foreign_key.qualified(), ids);
        let results = match query.all(cx, conn).await {
            Outcome::Ok(results) => results,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        tracing::debug!(fetched = results.len(), "Fetched related rows");

        self.init_relation(parents, &slot);
        match self.match_eager(parents, results, &slot) {
            Ok(()) => Outcome::Ok(()),
            Err(e) => Outcome::Err(e),
        }
    }
}

impl<P: Model, R: Model> Relation for ColumnMany<P, R> {
    type Parent = P;
    type Related = R;

    fn add_constraints(
        &self,
        query: Select<R>,
        parent: &P,
        mode: ConstraintMode,
    ) -> Result<Select<R>> {
        if mode == ConstraintMode::Skip {
            return Ok(query);
        }
        let ids = unique_ids(&self.parent_ids(parent)?);
        Ok(query.where_in(&self.foreign_key.qualified(), ids))
    }

    fn add_eager_constraints(&self, query: Select<R>, parents: &[P]) -> Result<Select<R>> {
        let ids = self.batch_ids(parents)?;
        Ok(query.where_in(&self.foreign_key.qualified(), ids))
    }

    fn init_relation<F>(&self, parents: &mut [P], slot: F)
    where
        F: Fn(&mut P) -> &mut RelatedMany<R>,
    {
        for parent in parents.iter_mut() {
            slot(parent).set_loaded(Vec::new());
        }
    }

    fn match_eager<F>(&self, parents: &mut [P], results: Vec<R>, slot: F) -> Result<()>
    where
        R: Clone,
        F: Fn(&mut P) -> &mut RelatedMany<R>,
    {
        let dictionary = Dictionary::build(results, self.foreign_key.column());
        for parent in parents.iter_mut() {
            let ids = self.parent_ids(parent)?;
            let related = dictionary.collect_ordered(&ids);
            tracing::trace!(ids = ids.len(), matched = related.len(), "Matched parent");
            slot(parent).set_loaded(related);
        }
        Ok(())
    }

    fn get_results<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        parent: &P,
    ) -> impl Future<Output = Outcome<Vec<R>, Error>> {
        let prepared = self.parent_ids(parent).and_then(|ids| {
            let query = self.add_constraints(self.related_query(), parent, ConstraintMode::Apply)?;
            Ok((ids, query))
        });
        let key = self.foreign_key.column().to_string();

        async move {
            let (ids, query) = match prepared {
                Ok(prepared) => prepared,
                Err(e) => return Outcome::Err(e),
            };
            let models = match query.all(cx, conn).await {
                Outcome::Ok(models) => models,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            let fetched = models.len();
            let sorted = sort_by_id_order(models, &ids, &key);
            tracing::debug!(fetched, kept = sorted.len(), "Resolved column-many results");
            Outcome::Ok(sorted)
        }
    }
}

impl<P, R> Clone for ColumnMany<P, R> {
    fn clone(&self) -> Self {
        Self {
            local_keys: self.local_keys.clone(),
            foreign_key: self.foreign_key.clone(),
            options: self.options.clone(),
            _marker: PhantomData,
        }
    }
}

impl<P, R> fmt::Debug for ColumnMany<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnMany")
            .field("local_keys", &self.local_keys)
            .field("foreign_key", &self.foreign_key)
            .field("options", &self.options)
            .finish()
    }
}

/// A relation bound to one parent instance.
///
/// Reads the parent's columns on every call; nothing decoded is cached.
pub struct BoundColumnMany<'p, P, R> {
    relation: ColumnMany<P, R>,
    parent: &'p P,
}

impl<'p, P: Model, R: Model> BoundColumnMany<'p, P, R> {
    pub fn relation(&self) -> &ColumnMany<P, R> {
        &self.relation
    }

    pub fn parent(&self) -> &'p P {
        self.parent
    }

    /// The parent's decoded ids, in column order with repeats.
    pub fn ids(&self) -> Result<Vec<i64>> {
        self.relation.parent_ids(self.parent)
    }

    /// The related query, constrained to this parent under `mode`.
    pub fn query(&self, mode: ConstraintMode) -> Result<Select<R>> {
        self.relation
            .add_constraints(self.relation.related_query(), self.parent, mode)
    }

    /// Fetch this parent's related rows in column order.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, conn),
        fields(parent = P::TABLE_NAME, related = R::TABLE_NAME)
    )]
    pub async fn get_results<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<Vec<R>, Error> {
        self.relation.get_results(cx, conn, self.parent).await
    }

    /// Fetch and store this parent's related rows into `slot`.
    pub async fn load_into<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        slot: &mut RelatedMany<R>,
    ) -> Outcome<(), Error> {
        self.get_results(cx, conn).await.map(|models| {
            slot.set_loaded(models);
        })
    }
}

impl<P, R> fmt::Debug for BoundColumnMany<'_, P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundColumnMany")
            .field("relation", &self.relation)
            .finish_non_exhaustive()
    }
}

/// Column-many relations for every model.
pub trait HasColumnMany: Model {
    /// Relation from `self` to `R`, bound to `self`.
    fn has_column_many<R: Model>(
        &self,
        local_keys: impl IntoLocalKeys,
        foreign_key: Option<&str>,
    ) -> Result<BoundColumnMany<'_, Self, R>> {
        Ok(column_many::<Self, R>(local_keys, foreign_key)?.bind(self))
    }
}

impl<M: Model> HasColumnMany for M {}
