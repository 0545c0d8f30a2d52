//! WHERE and ORDER BY clauses.

use crate::expr::{Dialect, Expr};
use colmany_core::Value;

/// Accumulated WHERE condition.
///
/// Conditions fold left, so `a`, `.or(b)`, `.and(c)` renders as
/// `(a OR b) AND c`.
#[derive(Debug, Clone)]
pub struct Where {
    expr: Expr,
}

impl Where {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    pub fn and(self, expr: Expr) -> Self {
        Self::new(self.expr.and(expr))
    }

    pub fn or(self, expr: Expr) -> Self {
        Self::new(self.expr.or(expr))
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default(), 0)
    }

    /// Render for `dialect` after `offset` parameters already bound by the
    /// enclosing statement.
    pub fn build_with_dialect(&self, dialect: Dialect, offset: usize) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.expr.build_with_dialect(dialect, &mut params, offset);
        (sql, params)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term over a (possibly qualified) column.
#[derive(Debug, Clone)]
pub struct OrderBy {
    column: String,
    direction: OrderDirection,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, OrderDirection::Asc)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, OrderDirection::Desc)
    }

    fn new(column: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Render with the column quoted for `dialect`.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut params = Vec::new();
        let column = Expr::column_ref(&self.column).build_with_dialect(dialect, &mut params, 0);
        match self.direction {
            OrderDirection::Asc => format!("{column} ASC"),
            OrderDirection::Desc => format!("{column} DESC"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_offsets_placeholders() {
        let clause = Where::new(Expr::col("a").eq(1)).and(Expr::col("b").eq(2));
        let (sql, params) = clause.build_with_dialect(Dialect::Postgres, 3);
        assert_eq!(sql, "\"a\" = $4 AND \"b\" = $5");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn where_or_groups_with_and() {
        let clause = Where::new(Expr::col("a").eq(1))
            .or(Expr::col("b").eq(2))
            .and(Expr::col("c").eq(3));
        assert_eq!(clause.build().0, "(\"a\" = $1 OR \"b\" = $2) AND \"c\" = $3");
    }

    #[test]
    fn order_by_quotes_per_dialect() {
        assert_eq!(OrderBy::asc("name").to_sql(Dialect::Postgres), "\"name\" ASC");
        assert_eq!(OrderBy::desc("tags.id").to_sql(Dialect::Mysql), "`tags`.`id` DESC");
    }
}
