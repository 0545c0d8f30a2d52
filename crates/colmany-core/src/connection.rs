//! Database connection traits.
//!
//! [`Connection`] is the only way relations reach storage. Every operation
//! takes an asupersync [`Cx`] so cancellation and budgets are owned by the
//! caller's region, and returns an [`Outcome`].

use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};

/// Placeholder and quoting rules of the backing database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// `$n` placeholders, double-quoted identifiers
    #[default]
    Postgres,
    /// `?n` placeholders, double-quoted identifiers
    Sqlite,
    /// Positional `?`, backtick identifiers
    Mysql,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote `name`, doubling embedded quote characters.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
            Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
        }
    }
}

/// Storage seen by relations and query builders.
///
/// Futures must be `Send` so a loader can move between workers of the
/// caller's runtime.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query(&cx, "SELECT * FROM tags WHERE id = $1", &[Value::BigInt(1)]).await;
/// ```
pub trait Connection: Send + Sync {
    /// Dialect used when rendering statements for this connection.
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    /// Fetch every row of `sql`.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    /// Fetch the first row of `sql`, if there is one.
    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, crate::Error>> + Send;

    /// Run a write statement; resolves to the affected row count.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;

    /// Run an INSERT; resolves to the generated key.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, crate::Error>> + Send;
}
