//! UNION builder

use crate::Builder;
use crate::args::ArgValue;
use crate::cond::Cond;
use crate::select::SelectBuilder;
use sqlrelay_core::{DbError, Dialect, Result, Value};

/// A builder to build UNION over sub-SELECTs
pub struct UnionBuilder {
    pub cond: Cond,
    opt: &'static str,
    order: &'static str,
    tokens: Vec<String>,
    order_by_cols: Vec<String>,
    limit: i64,
    offset: i64,
}

impl UnionBuilder {
    fn with_opt(opt: &'static str, builders: Vec<SelectBuilder>) -> Self {
        let mut b = Self {
            cond: Cond::new(Dialect::default()),
            opt,
            order: "",
            tokens: Vec::new(),
            order_by_cols: Vec::new(),
            limit: -1,
            offset: -1,
        };
        for sb in builders {
            b.add(sb);
        }
        b
    }

    /// New UNION builder
    pub fn union(builders: Vec<SelectBuilder>) -> Self {
        Self::with_opt(" UNION ", builders)
    }

    /// New UNION ALL builder
    pub fn union_all(builders: Vec<SelectBuilder>) -> Self {
        Self::with_opt(" UNION ALL ", builders)
    }

    /// Append a sub-SELECT
    pub fn add(&mut self, builder: SelectBuilder) -> &mut Self {
        let token = self.cond.var(ArgValue::Builder(Box::new(builder)));
        self.tokens.push(token);
        self
    }

    /// Set the compilation dialect
    pub fn set_dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.cond.set_dialect(dialect);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.cond.dialect()
    }

    /// Set columns of ORDER BY
    pub fn order_by<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by_cols = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn asc(&mut self) -> &mut Self {
        self.order = "ASC";
        self
    }

    pub fn desc(&mut self) -> &mut Self {
        self.order = "DESC";
        self
    }

    /// Set the LIMIT; a negative value clears it
    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Set the OFFSET; a negative value clears it
    pub fn offset(&mut self, offset: i64) -> &mut Self {
        self.offset = offset;
        self
    }

    /// At least two sub-SELECTs are required for a meaningful UNION
    pub fn safety(&self) -> Result<()> {
        if self.tokens.len() < 2 {
            return Err(DbError::Exception(
                "union requires at least two SELECT builders".to_string(),
            ));
        }
        Ok(())
    }

    fn draft(&self, dialect: Dialect) -> String {
        let mut buf = String::with_capacity(256);
        let paren = dialect.union_parentheses();

        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                buf.push_str(self.opt);
            }
            if paren {
                buf.push('(');
            }
            buf.push_str(token);
            if paren {
                buf.push(')');
            }
        }

        if !self.order_by_cols.is_empty() {
            buf.push_str(" ORDER BY ");
            buf.push_str(&self.order_by_cols.join(", "));
            if !self.order.is_empty() {
                buf.push(' ');
                buf.push_str(self.order);
            }
        }

        if self.limit >= 0 {
            buf.push_str(&format!(" LIMIT {}", self.limit));
        }

        if self.offset >= 0 {
            match dialect {
                // these engines only accept OFFSET alongside a LIMIT
                Dialect::MySQL | Dialect::Doris => {
                    if self.limit >= 0 {
                        buf.push_str(&format!(" OFFSET {}", self.offset));
                    }
                }
                Dialect::MsSQL => {
                    if self.limit >= 0 {
                        buf.push_str(&format!(" OFFSET {} ROWS", self.offset));
                    }
                }
                Dialect::PostgreSQL | Dialect::SQLite | Dialect::ClickHouse => {
                    buf.push_str(&format!(" OFFSET {}", self.offset));
                }
            }
        }

        buf
    }
}

impl Builder for UnionBuilder {
    fn build(&self) -> Result<(String, Vec<Value>)> {
        self.cond.args.compile(&self.draft(self.cond.dialect()))
    }

    fn compile_into(&self, dialect: Dialect, values: &mut Vec<Value>) -> Result<String> {
        self.cond
            .args
            .compile_into(&self.draft(dialect), dialect, values)
    }

    fn to_sql_string(&self) -> String {
        self.cond
            .args
            .compile_string(&self.draft(self.cond.dialect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn select_all(dialect: Dialect, table: &str) -> SelectBuilder {
        let mut sb = SelectBuilder::select(["*"]);
        sb.set_dialect(dialect).from([table]);
        sb
    }

    #[test]
    fn union_postgres_wraps_subselects() {
        let mut ub = UnionBuilder::union(vec![
            select_all(Dialect::PostgreSQL, "user"),
            select_all(Dialect::PostgreSQL, "user2"),
        ]);
        ub.set_dialect(Dialect::PostgreSQL);

        let (sql, _) = ub.build().unwrap();
        assert_eq!(
            sql,
            "(SELECT * FROM \"user\") UNION (SELECT * FROM \"user2\")"
        );
    }

    #[test]
    fn union_sqlite_has_no_parentheses() {
        let mut ub = UnionBuilder::union(vec![
            select_all(Dialect::SQLite, "user"),
            select_all(Dialect::SQLite, "user2"),
        ]);
        ub.set_dialect(Dialect::SQLite);

        let (sql, _) = ub.build().unwrap();
        assert_eq!(sql, "SELECT * FROM \"user\" UNION SELECT * FROM \"user2\"");
    }

    #[test]
    fn union_all_operator() {
        let mut ub = UnionBuilder::union_all(vec![
            select_all(Dialect::MySQL, "a"),
            select_all(Dialect::MySQL, "b"),
        ]);
        ub.set_dialect(Dialect::MySQL);

        let (sql, _) = ub.build().unwrap();
        assert_eq!(sql, "(SELECT * FROM `a`) UNION ALL (SELECT * FROM `b`)");
    }

    #[test]
    fn union_arguments_compile_in_order() {
        let mut first = select_all(Dialect::PostgreSQL, "user");
        let w = first.cond.ge("age", 18);
        first.and_where(w);
        let mut second = select_all(Dialect::PostgreSQL, "user2");
        let w = second.cond.le("age", 30);
        second.and_where(w);

        let mut ub = UnionBuilder::union(vec![first, second]);
        ub.set_dialect(Dialect::PostgreSQL);

        let (sql, values) = ub.build().unwrap();
        assert_eq!(
            sql,
            "(SELECT * FROM \"user\" WHERE \"age\" >= $1) UNION (SELECT * FROM \"user2\" WHERE \"age\" <= $2)"
        );
        assert_eq!(values, vec![Value::Int(18), Value::Int(30)]);
    }

    #[test]
    fn union_offset_rules() {
        let make = |dialect| {
            let mut ub = UnionBuilder::union(vec![
                select_all(dialect, "a"),
                select_all(dialect, "b"),
            ]);
            ub.set_dialect(dialect).limit(5).offset(10);
            ub.build().unwrap().0
        };
        assert!(make(Dialect::MySQL).ends_with(" LIMIT 5 OFFSET 10"));
        assert!(make(Dialect::MsSQL).ends_with(" LIMIT 5 OFFSET 10 ROWS"));
        assert!(make(Dialect::PostgreSQL).ends_with(" LIMIT 5 OFFSET 10"));

        // OFFSET without LIMIT survives only where the engine allows it
        let mut ub = UnionBuilder::union(vec![
            select_all(Dialect::MySQL, "a"),
            select_all(Dialect::MySQL, "b"),
        ]);
        ub.set_dialect(Dialect::MySQL).offset(10);
        assert!(!ub.build().unwrap().0.contains("OFFSET"));

        let mut ub = UnionBuilder::union(vec![
            select_all(Dialect::SQLite, "a"),
            select_all(Dialect::SQLite, "b"),
        ]);
        ub.set_dialect(Dialect::SQLite).offset(10);
        assert!(ub.build().unwrap().0.ends_with(" OFFSET 10"));
    }

    #[test]
    fn union_safety_requires_two() {
        let ub = UnionBuilder::union(vec![select_all(Dialect::MySQL, "a")]);
        assert!(ub.safety().is_err());
        let mut ub = UnionBuilder::union(vec![
            select_all(Dialect::MySQL, "a"),
            select_all(Dialect::MySQL, "b"),
        ]);
        ub.set_dialect(Dialect::MySQL);
        assert!(ub.safety().is_ok());
    }
}
