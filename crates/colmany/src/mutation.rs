//! Lookup and write helpers on a bound relation.
//!
//! Every helper that produces or saves a related row first stamps its
//! foreign key with the bound parent's primary key.

use crate::relation::{BoundColumnMany, ConstraintMode};
use asupersync::{Cx, Outcome};
use colmany_core::{Connection, Error, Model, Value};
use colmany_query::{Expr, Select, persist};

/// Attribute/value pairs used to match or fill related rows.
pub type Attributes<'a> = [(&'a str, Value)];

fn lift<T>(result: colmany_core::Result<T>) -> Outcome<T, Error> {
    match result {
        Ok(value) => Outcome::Ok(value),
        Err(e) => Outcome::Err(e),
    }
}

impl<P: Model, R: Model> BoundColumnMany<'_, P, R> {
    /// Write the parent's primary key into `model`'s foreign key column.
    pub fn stamp(&self, model: &mut R) -> colmany_core::Result<()> {
        model.set_attribute(
            self.relation().foreign_key().column(),
            self.parent().primary_key_value(),
        )
    }

    fn scoped(&self) -> colmany_core::Result<Select<R>> {
        self.query(ConstraintMode::Apply)
    }

    fn matching(&self, attributes: &Attributes<'_>) -> colmany_core::Result<Select<R>> {
        let mut query = self.scoped()?;
        for (column, value) in attributes {
            query = query.filter(Expr::qualified(R::TABLE_NAME, *column).eq(value.clone()));
        }
        Ok(query)
    }

    fn new_stamped(&self, attributes: &Attributes<'_>) -> colmany_core::Result<R>
    where
        R: Default,
    {
        let mut instance = R::new_instance(attributes.iter().map(|(c, v)| (*c, v.clone())))?;
        self.stamp(&mut instance)?;
        Ok(instance)
    }

    /// Look up a related row by primary key within this parent's ids.
    pub async fn find<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        id: impl Into<Value>,
    ) -> Outcome<Option<R>, Error> {
        let query = match self.scoped() {
            Ok(query) => query,
            Err(e) => return Outcome::Err(e),
        };
        query
            .filter(Expr::qualified(R::TABLE_NAME, R::PRIMARY_KEY).eq(id.into()))
            .first(cx, conn)
            .await
    }

    /// [`find`](Self::find), or a new unsaved row stamped with the parent key.
    pub async fn find_or_new<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        id: impl Into<Value>,
    ) -> Outcome<R, Error>
    where
        R: Default,
    {
        match self.find(cx, conn, id).await {
            Outcome::Ok(Some(found)) => Outcome::Ok(found),
            Outcome::Ok(None) => lift(self.new_stamped(&[])),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// First related row matching `attributes`, or a new unsaved row filled
    /// with `attributes` then `values` and stamped with the parent key.
    pub async fn first_or_new<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        attributes: &Attributes<'_>,
        values: &Attributes<'_>,
    ) -> Outcome<R, Error>
    where
        R: Default,
    {
        let query = match self.matching(attributes) {
            Ok(query) => query,
            Err(e) => return Outcome::Err(e),
        };
        match query.first(cx, conn).await {
            Outcome::Ok(Some(found)) => Outcome::Ok(found),
            Outcome::Ok(None) => {
                let merged: Vec<(&str, Value)> =
                    attributes.iter().chain(values).cloned().collect();
                lift(self.new_stamped(&merged))
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// First related row matching `attributes`, or a newly created one.
    pub async fn first_or_create<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        attributes: &Attributes<'_>,
        values: &Attributes<'_>,
    ) -> Outcome<R, Error>
    where
        R: Default,
    {
        let query = match self.matching(attributes) {
            Ok(query) => query,
            Err(e) => return Outcome::Err(e),
        };
        match query.first(cx, conn).await {
            Outcome::Ok(Some(found)) => Outcome::Ok(found),
            Outcome::Ok(None) => {
                let merged: Vec<(&str, Value)> =
                    attributes.iter().chain(values).cloned().collect();
                self.create(cx, conn, &merged).await
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Find the row matching `attributes` (or start a new one), fill it with
    /// `values` and persist it.
    pub async fn update_or_create<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        attributes: &Attributes<'_>,
        values: &Attributes<'_>,
    ) -> Outcome<R, Error>
    where
        R: Default,
    {
        let mut instance = match self.first_or_new(cx, conn, attributes, &[]).await {
            Outcome::Ok(instance) => instance,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if let Err(e) = instance.fill(values.iter().map(|(c, v)| (*c, v.clone()))) {
            return Outcome::Err(e);
        }
        let outcome = persist(cx, conn, &mut instance).await;
        outcome.map(|()| instance)
    }

    /// Stamp and persist `model`.
    ///
    /// Returns `false` when the write fails; the failure is logged, not
    /// returned.
    pub async fn save<C: Connection>(&self, cx: &Cx, conn: &C, model: &mut R) -> Outcome<bool, Error> {
        if let Err(e) = self.stamp(model) {
            tracing::warn!(table = R::TABLE_NAME, error = %e, "Could not stamp foreign key");
            return Outcome::Ok(false);
        }
        match persist(cx, conn, model).await {
            Outcome::Ok(()) => Outcome::Ok(true),
            Outcome::Err(e) => {
                tracing::warn!(table = R::TABLE_NAME, error = %e, "Save failed");
                Outcome::Ok(false)
            }
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// [`save`](Self::save) each model; returns how many were persisted.
    pub async fn save_many<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        models: &mut [R],
    ) -> Outcome<usize, Error> {
        let mut saved = 0;
        for model in models.iter_mut() {
            match self.save(cx, conn, model).await {
                Outcome::Ok(true) => saved += 1,
                Outcome::Ok(false) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        tracing::debug!(saved, total = models.len(), "Saved related rows");
        Outcome::Ok(saved)
    }

    /// Build a related row from `attributes`, stamp it and persist it.
    #[tracing::instrument(level = "debug", skip_all, fields(table = R::TABLE_NAME))]
    pub async fn create<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        attributes: &Attributes<'_>,
    ) -> Outcome<R, Error>
    where
        R: Default,
    {
        let mut instance = match self.new_stamped(attributes) {
            Ok(instance) => instance,
            Err(e) => return Outcome::Err(e),
        };
        let outcome = persist(cx, conn, &mut instance).await;
        outcome.map(|()| instance)
    }

    /// [`create`](Self::create) for each record; stops at the first failure.
    pub async fn create_many<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        records: &[Vec<(&str, Value)>],
    ) -> Outcome<Vec<R>, Error>
    where
        R: Default,
    {
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            match self.create(cx, conn, record).await {
                Outcome::Ok(instance) => created.push(instance),
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        Outcome::Ok(created)
    }
}
