//! SELECT statements over a model's table.

use crate::clause::{OrderBy, Where};
use crate::expr::{Dialect, Expr};
use asupersync::{Cx, Outcome};
use colmany_core::{Connection, Model, Value};
use std::marker::PhantomData;

/// SELECT over one model's table.
///
/// The table may be read under an alias; [`table_ref`](Self::table_ref) is
/// the name other clauses should qualify columns with.
#[derive(Debug, Clone)]
pub struct Select<M: Model> {
    /// Empty selects `*`
    columns: Vec<String>,
    alias: Option<String>,
    where_clause: Option<Where>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    _marker: PhantomData<M>,
}

impl<M: Model> Select<M> {
    /// `SELECT *` over `M::TABLE_NAME`.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            alias: None,
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            _marker: PhantomData,
        }
    }

    /// Replace the projection.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|&s| s.to_string()).collect();
        self
    }

    /// Select FROM the model's table under `alias`.
    pub fn from_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The FROM alias, if one is set.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The name other clauses should use to refer to this query's table.
    pub fn table_ref(&self) -> &str {
        self.alias.as_deref().unwrap_or(M::TABLE_NAME)
    }

    /// Add a WHERE condition (ANDed with any existing conditions).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// OR `expr` onto the accumulated filter.
    pub fn or_filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.or(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Add `column IN (values)`.
    ///
    /// `column` may be qualified (`table.column`). An empty value set matches
    /// no rows.
    pub fn where_in<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Expr> = values.into_iter().map(|v| Expr::Literal(v.into())).collect();
        self.filter(Expr::column_ref(column).in_list(values))
    }

    /// Add a column-to-column equality (`first = second`).
    pub fn where_column(self, first: &str, second: &str) -> Self {
        self.filter(Expr::column_ref(first).eq(Expr::column_ref(second)))
    }

    /// Add an ORDER BY clause.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set the LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// The current WHERE clause, if any.
    pub fn where_clause(&self) -> Option<&Where> {
        self.where_clause.as_ref()
    }

    fn from_sql(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {alias}", M::TABLE_NAME),
            None => M::TABLE_NAME.to_string(),
        }
    }

    /// Build the SQL query and parameters with default dialect (Postgres).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Render for `dialect`, returning SQL and bound parameters.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&self.from_sql());

        if let Some(where_clause) = &self.where_clause {
            let (where_sql, where_params) = where_clause.build_with_dialect(dialect, params.len());
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }

        if !self.order_by.is_empty() {
            let order_strs: Vec<_> = self.order_by.iter().map(|o| o.to_sql(dialect)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_strs.join(", "));
        }

        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        (sql, params)
    }

    /// Turn the query into a correlated `EXISTS` predicate.
    ///
    /// The sub-query selects `1` and keeps only the FROM (with alias) and
    /// WHERE parts; ORDER BY and LIMIT have no effect inside EXISTS.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let has_tags = Select::<Tag>::new()
    ///     .where_column("tags.post_id", "posts.id")
    ///     .into_exists();
    ///
    /// // SELECT * FROM posts WHERE EXISTS (SELECT 1 FROM tags WHERE "tags"."post_id" = "posts"."id")
    /// let posts = Select::<Post>::new().filter(has_tags).all(cx, &conn).await;
    /// ```
    pub fn into_exists(self) -> Expr {
        let from = self.from_sql();
        Expr::exists(from, self.where_clause.map(Where::into_expr))
    }

    /// Negated form of [`Select::into_exists`].
    pub fn into_not_exists(self) -> Expr {
        let from = self.from_sql();
        Expr::not_exists(from, self.where_clause.map(Where::into_expr))
    }

    /// Fetch and decode every matching row.
    pub async fn all<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<Vec<M>, colmany_core::Error> {
        let (sql, params) = self.build_with_dialect(conn.dialect());
        tracing::trace!(sql = %sql, params = params.len(), "Executing SELECT");
        let rows = conn.query(cx, &sql, &params).await;

        rows.and_then(|rows| {
            let mut models = Vec::with_capacity(rows.len());
            for row in &rows {
                match M::from_row(row) {
                    Ok(model) => models.push(model),
                    Err(e) => return Outcome::Err(e),
                }
            }
            Outcome::Ok(models)
        })
    }

    /// Fetch at most one row (`LIMIT 1`).
    pub async fn first<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<Option<M>, colmany_core::Error> {
        let query = self.limit(1);
        let (sql, params) = query.build_with_dialect(conn.dialect());
        tracing::trace!(sql = %sql, params = params.len(), "Executing SELECT (first)");
        let row = conn.query_one(cx, &sql, &params).await;

        row.and_then(|opt_row| match opt_row {
            Some(row) => match M::from_row(&row) {
                Ok(model) => Outcome::Ok(Some(model)),
                Err(e) => Outcome::Err(e),
            },
            None => Outcome::Ok(None),
        })
    }

    /// Like [`Select::first`], but an empty result is an error.
    pub async fn one<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<M, colmany_core::Error> {
        match self.first(cx, conn).await {
            Outcome::Ok(Some(model)) => Outcome::Ok(model),
            Outcome::Ok(None) => Outcome::Err(colmany_core::Error::Custom(
                "Expected one row, found none".to_string(),
            )),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}

impl<M: Model> Default for Select<M> {
    fn default() -> Self {
        Self::new()
    }
}
