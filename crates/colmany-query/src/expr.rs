//! Predicate expressions.
//!
//! Relations only need a narrow predicate language: column comparisons,
//! id lists, conjunctions and correlated `EXISTS`. Expressions render for a
//! [`Dialect`] and append bound values to the caller's parameter list, so
//! nested sub-queries share the outer statement's placeholder numbering.

use colmany_core::Value;

pub use colmany_core::Dialect;

/// A WHERE-clause expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// `table.name`, or `name` when unqualified
    Column { table: Option<String>, name: String },
    /// Bound as a parameter, except `Value::Default`
    Literal(Value),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    In { expr: Box<Expr>, values: Vec<Expr> },
    /// `[NOT] EXISTS (SELECT 1 FROM {from} [WHERE filter])`
    Exists {
        from: String,
        filter: Option<Box<Expr>>,
        negated: bool,
    },
    Raw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    And,
    Or,
}

impl BinaryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    /// Higher binds tighter.
    const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq => 3,
        }
    }
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: column.into(),
        }
    }

    /// Column from a `table.column` or bare `column` path.
    pub fn column_ref(path: &str) -> Self {
        path.rsplit_once('.')
            .map_or_else(|| Expr::col(path), |(table, column)| Expr::qualified(table, column))
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// Matches no row.
    pub fn never() -> Self {
        Expr::raw("1 = 0")
    }

    pub fn exists(from: impl Into<String>, filter: Option<Expr>) -> Self {
        Expr::Exists {
            from: from.into(),
            filter: filter.map(Box::new),
            negated: false,
        }
    }

    pub fn not_exists(from: impl Into<String>, filter: Option<Expr>) -> Self {
        Expr::Exists {
            from: from.into(),
            filter: filter.map(Box::new),
            negated: true,
        }
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// `self IN (values)`; an empty list never matches.
    pub fn in_list<V: Into<Expr>>(self, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Expr> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Expr::never();
        }
        Expr::In {
            expr: Box::new(self),
            values,
        }
    }

    /// Render with the Postgres dialect.
    pub fn build(&self, params: &mut Vec<Value>, offset: usize) -> String {
        self.build_with_dialect(Dialect::Postgres, params, offset)
    }

    /// Render for `dialect`. The n-th pushed parameter gets placeholder
    /// `offset + n`.
    pub fn build_with_dialect(&self, dialect: Dialect, params: &mut Vec<Value>, offset: usize) -> String {
        let mut writer = SqlWriter {
            dialect,
            params,
            offset,
            out: String::new(),
        };
        writer.expr(self);
        writer.out
    }
}

struct SqlWriter<'a> {
    dialect: Dialect,
    params: &'a mut Vec<Value>,
    offset: usize,
    out: String,
}

impl SqlWriter<'_> {
    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Column { table, name } => {
                if let Some(table) = table {
                    self.ident(table);
                    self.out.push('.');
                }
                self.ident(name);
            }
            Expr::Literal(Value::Default) => self.out.push_str("DEFAULT"),
            Expr::Literal(value) => {
                self.params.push(value.clone());
                let placeholder = self.dialect.placeholder(self.offset + self.params.len());
                self.out.push_str(&placeholder);
            }
            Expr::Binary { left, op, right } => {
                self.operand(left, *op);
                self.out.push(' ');
                self.out.push_str(op.as_str());
                self.out.push(' ');
                self.operand(right, *op);
            }
            Expr::In { expr, values } => {
                self.expr(expr);
                self.out.push_str(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(value);
                }
                self.out.push(')');
            }
            Expr::Exists {
                from,
                filter,
                negated,
            } => {
                if *negated {
                    self.out.push_str("NOT ");
                }
                self.out.push_str("EXISTS (SELECT 1 FROM ");
                self.out.push_str(from);
                if let Some(filter) = filter {
                    self.out.push_str(" WHERE ");
                    self.expr(filter);
                }
                self.out.push(')');
            }
            Expr::Raw(sql) => self.out.push_str(sql),
        }
    }

    /// Children binding looser than `parent` get parentheses.
    fn operand(&mut self, expr: &Expr, parent: BinaryOp) {
        let wrap = matches!(expr, Expr::Binary { op, .. } if op.precedence() < parent.precedence());
        if wrap {
            self.out.push('(');
        }
        self.expr(expr);
        if wrap {
            self.out.push(')');
        }
    }

    fn ident(&mut self, name: &str) {
        let quoted = self.dialect.quote_identifier(name);
        self.out.push_str(&quoted);
    }
}

macro_rules! literal_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for Expr {
                fn from(v: $source) -> Self {
                    Expr::Literal(v.into())
                }
            }
        )*
    };
}

literal_from!(Value, &str, String, i32, i64, bool);

#[cfg(test)]
mod tests {
    use super::*;

    fn render(expr: &Expr) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = expr.build(&mut params, 0);
        (sql, params)
    }

    #[test]
    fn column_ref_splits_on_last_dot() {
        assert_eq!(render(&Expr::column_ref("tags.post_id")).0, "\"tags\".\"post_id\"");
        assert_eq!(render(&Expr::column_ref("post_id")).0, "\"post_id\"");
    }

    #[test]
    fn in_list_binds_each_value() {
        let (sql, params) = render(&Expr::col("id").in_list([3_i64, 1, 2]));
        assert_eq!(sql, "\"id\" IN ($1, $2, $3)");
        assert_eq!(params, vec![Value::BigInt(3), Value::BigInt(1), Value::BigInt(2)]);
    }

    #[test]
    fn empty_in_list_never_matches() {
        let (sql, params) = render(&Expr::col("id").in_list(Vec::<i64>::new()));
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());
    }

    #[test]
    fn or_inside_and_is_parenthesized() {
        let expr = Expr::col("a")
            .eq(1)
            .or(Expr::col("b").eq(2))
            .and(Expr::col("c").eq(3));
        let (sql, params) = render(&expr);
        assert_eq!(sql, "(\"a\" = $1 OR \"b\" = $2) AND \"c\" = $3");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn exists_uses_outer_numbering() {
        let correlated = Expr::qualified("r", "post_id").eq(Expr::qualified("posts", "id"));
        let expr = Expr::col("active")
            .eq(true)
            .and(Expr::exists("tags AS r", Some(correlated.and(Expr::col("x").eq(5)))));
        let (sql, params) = render(&expr);
        assert_eq!(
            sql,
            "\"active\" = $1 AND EXISTS (SELECT 1 FROM tags AS r WHERE \"r\".\"post_id\" = \"posts\".\"id\" AND \"x\" = $2)"
        );
        assert_eq!(params, vec![Value::Bool(true), Value::Int(5)]);
    }

    #[test]
    fn dialect_placeholders_and_quoting() {
        let mut params = Vec::new();
        let sql = Expr::qualified("tags", "name")
            .eq("rust")
            .build_with_dialect(Dialect::Mysql, &mut params, 0);
        assert_eq!(sql, "`tags`.`name` = ?");

        let mut params = vec![Value::Null];
        let sql = Expr::col("id").eq(1).build_with_dialect(Dialect::Sqlite, &mut params, 0);
        assert_eq!(sql, "\"id\" = ?2");
    }

    #[test]
    fn not_exists_and_default_literal() {
        assert_eq!(render(&Expr::not_exists("tags", None)).0, "NOT EXISTS (SELECT 1 FROM tags)");
        let (sql, params) = render(&Expr::lit(Value::Default));
        assert_eq!(sql, "DEFAULT");
        assert!(params.is_empty());
    }
}
