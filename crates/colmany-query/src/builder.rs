//! Query builders for INSERT and UPDATE, and model persistence.

use crate::clause::Where;
use crate::expr::{Dialect, Expr};
use asupersync::{Cx, Outcome};
use colmany_core::{Connection, Error, Model, Value};

/// `INSERT` of every column a model reports.
#[derive(Debug)]
pub struct InsertBuilder<'a, M: Model> {
    model: &'a M,
}

impl<'a, M: Model> InsertBuilder<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Render for `dialect`.
    ///
    /// A NULL primary key is left out so the database can generate it.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let (columns, values): (Vec<&str>, Vec<Value>) = self
            .model
            .to_row()
            .into_iter()
            .filter(|(name, value)| !(*name == M::PRIMARY_KEY && value.is_null()))
            .unzip();

        let placeholders: Vec<_> = (1..=values.len())
            .map(|i| dialect.placeholder(i))
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            M::TABLE_NAME,
            columns.join(", "),
            placeholders.join(", ")
        );

        (sql, values)
    }

    /// Resolves to the generated key.
    pub async fn execute<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<i64, Error> {
        let (sql, params) = self.build_with_dialect(conn.dialect());
        tracing::trace!(sql = %sql, params = params.len(), "Executing INSERT");
        conn.insert(cx, &sql, &params).await
    }
}

/// `UPDATE` of a persisted model, keyed on its primary key.
#[derive(Debug)]
pub struct UpdateBuilder<'a, M: Model> {
    model: &'a M,
    where_clause: Option<Where>,
    set_fields: Option<Vec<&'static str>>,
}

impl<'a, M: Model> UpdateBuilder<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self {
            model,
            where_clause: None,
            set_fields: None,
        }
    }

    /// Restrict the SET list to `fields`.
    pub fn set_only(mut self, fields: &[&'static str]) -> Self {
        self.set_fields = Some(fields.to_vec());
        self
    }

    /// Replace the primary-key match with `expr` (ANDed when repeated).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut set_clauses = Vec::new();

        for (name, value) in self.model.to_row() {
            if name == M::PRIMARY_KEY {
                continue;
            }
            if let Some(fields) = &self.set_fields {
                if !fields.contains(&name) {
                    continue;
                }
            }
            params.push(value);
            set_clauses.push(format!("{name} = {}", dialect.placeholder(params.len())));
        }

        let mut sql = format!("UPDATE {} SET {}", M::TABLE_NAME, set_clauses.join(", "));

        let where_clause = match &self.where_clause {
            Some(where_clause) => where_clause.clone(),
            None => Where::new(Expr::col(M::PRIMARY_KEY).eq(self.model.primary_key_value())),
        };
        let (where_sql, where_params) = where_clause.build_with_dialect(dialect, params.len());
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
        params.extend(where_params);

        (sql, params)
    }

    /// Resolves to the affected row count.
    pub async fn execute<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        let (sql, params) = self.build_with_dialect(conn.dialect());
        tracing::trace!(sql = %sql, params = params.len(), "Executing UPDATE");
        conn.execute(cx, &sql, &params).await
    }
}

/// Insert `model` if it is new, update it otherwise.
///
/// A generated primary key is written back onto the model after an insert.
/// Failures are reported as [`Error::Persistence`] for the model's table.
#[tracing::instrument(level = "debug", skip(cx, conn, model), fields(table = M::TABLE_NAME))]
pub async fn persist<M: Model, C: Connection>(
    cx: &Cx,
    conn: &C,
    model: &mut M,
) -> Outcome<(), Error> {
    if model.is_new() {
        let id = match InsertBuilder::new(&*model).execute(cx, conn).await {
            Outcome::Ok(id) => id,
            Outcome::Err(e) => return Outcome::Err(Error::persistence(M::TABLE_NAME, e)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if let Err(e) = model.set_attribute(M::PRIMARY_KEY, Value::BigInt(id)) {
            return Outcome::Err(Error::persistence(M::TABLE_NAME, e));
        }
        tracing::debug!(id, "Inserted row");
        Outcome::Ok(())
    } else {
        match UpdateBuilder::new(&*model).execute(cx, conn).await {
            Outcome::Ok(affected) => {
                tracing::debug!(affected, "Updated row");
                Outcome::Ok(())
            }
            Outcome::Err(e) => Outcome::Err(Error::persistence(M::TABLE_NAME, e)),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use colmany_core::{QueryError, QueryErrorKind, Result, Row};
    use std::sync::{Arc, Mutex};

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

    fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
        }
    }

    #[derive(Debug, Default)]
    struct MockState {
        statements: Vec<(String, Vec<Value>)>,
        next_id: i64,
        fail_writes: bool,
    }

    struct MockConnection {
        state: Arc<Mutex<MockState>>,
    }

    impl MockConnection {
        fn write(&self, sql: &str, params: &[Value]) -> Outcome<i64, Error> {
            let mut guard = self.state.lock().expect("lock poisoned");
            guard.statements.push((sql.to_string(), params.to_vec()));
            if guard.fail_writes {
                return Outcome::Err(Error::Query(QueryError {
                    kind: QueryErrorKind::Constraint,
                    sql: Some(sql.to_string()),
                    message: "write rejected".to_string(),
                    source: None,
                }));
            }
            guard.next_id += 1;
            Outcome::Ok(guard.next_id)
        }
    }

    impl Connection for MockConnection {
        fn query(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
            async { Outcome::Ok(Vec::new()) }
        }

        fn query_one(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
            async { Outcome::Ok(None) }
        }

        fn execute(
            &self,
            _cx: &Cx,
            sql: &str,
            params: &[Value],
        ) -> impl Future<Output = Outcome<u64, Error>> + Send {
            let result = self.write(sql, params).map(|_| 1_u64);
            async move { result }
        }

        fn insert(
            &self,
            _cx: &Cx,
            sql: &str,
            params: &[Value],
        ) -> impl Future<Output = Outcome<i64, Error>> + Send {
            let result = self.write(sql, params);
            async move { result }
        }
    }

    #[test]
    fn test_insert_skips_null_primary_key() {
        let tag = Tag {
            id: None,
            post_id: Some(7),
            name: "rust".into(),
        };
        let (sql, params) = InsertBuilder::new(&tag).build();
        assert_eq!(sql, "INSERT INTO tags (post_id, name) VALUES ($1, $2)");
        assert_eq!(params, vec![Value::BigInt(7), Value::Text("rust".into())]);

        let tag = Tag { id: Some(3), ..tag };
        let (sql, _) = InsertBuilder::new(&tag).build_with_dialect(Dialect::Sqlite);
        assert_eq!(sql, "INSERT INTO tags (id, post_id, name) VALUES (?1, ?2, ?3)");
    }

    #[test]
    fn test_update_defaults_to_primary_key() {
        let tag = Tag {
            id: Some(4),
            post_id: Some(7),
            name: "db".into(),
        };
        let (sql, params) = UpdateBuilder::new(&tag).build();
        assert_eq!(sql, "UPDATE tags SET post_id = $1, name = $2 WHERE \"id\" = $3");
        assert_eq!(params.last(), Some(&Value::BigInt(4)));

        let (sql, params) = UpdateBuilder::new(&tag).set_only(&["name"]).build();
        assert_eq!(sql, "UPDATE tags SET name = $1 WHERE \"id\" = $2");
        assert_eq!(params.len(), 2);

        let (sql, _) = UpdateBuilder::new(&tag)
            .filter(Expr::col("post_id").eq(7_i64))
            .build_with_dialect(Dialect::Mysql);
        assert_eq!(sql, "UPDATE tags SET post_id = ?, name = ? WHERE `post_id` = ?");
    }

    #[test]
    fn test_persist_inserts_then_updates() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let state = Arc::new(Mutex::new(MockState {
            next_id: 40,
            ..MockState::default()
        }));
        let conn = MockConnection {
            state: Arc::clone(&state),
        };

        rt.block_on(async {
            let mut tag = Tag {
                name: "new".into(),
                ..Tag::default()
            };
            unwrap_outcome(persist(&cx, &conn, &mut tag).await);
            assert_eq!(tag.id, Some(41));

            tag.name = "renamed".into();
            unwrap_outcome(persist(&cx, &conn, &mut tag).await);

            let guard = state.lock().expect("lock poisoned");
            assert_eq!(guard.statements.len(), 2);
            assert!(guard.statements[0].0.starts_with("INSERT INTO tags"));
            assert!(guard.statements[1].0.starts_with("UPDATE tags"));
        });
    }

    #[test]
    fn test_persist_wraps_failures() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let conn = MockConnection {
            state: Arc::new(Mutex::new(MockState {
                fail_writes: true,
                ..MockState::default()
            })),
        };

        rt.block_on(async {
            let mut tag = Tag::default();
            match persist(&cx, &conn, &mut tag).await {
                Outcome::Err(Error::Persistence(err)) => assert_eq!(err.table, "tags"),
                other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
            }
            assert!(tag.id.is_none());
        });
    }
}
