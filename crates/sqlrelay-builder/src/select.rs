//! SELECT builder

use crate::args::ArgValue;
use crate::cond::Cond;
use crate::Builder;
use sqlrelay_core::{Dialect, Result, Value};

/// The option in JOIN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOption {
    Full,
    FullOuter,
    Inner,
    Left,
    LeftOuter,
    Right,
    RightOuter,
}

impl JoinOption {
    fn as_str(&self) -> &'static str {
        match self {
            JoinOption::Full => "FULL",
            JoinOption::FullOuter => "FULL OUTER",
            JoinOption::Inner => "INNER",
            JoinOption::Left => "LEFT",
            JoinOption::LeftOuter => "LEFT OUTER",
            JoinOption::Right => "RIGHT",
            JoinOption::RightOuter => "RIGHT OUTER",
        }
    }
}

/// A builder to build SELECT
pub struct SelectBuilder {
    pub cond: Cond,
    order: &'static str,
    for_what: &'static str,
    having_exprs: Vec<String>,
    join_options: Vec<Option<JoinOption>>,
    join_tables: Vec<String>,
    join_exprs: Vec<Vec<String>>,
    where_exprs: Vec<String>,
    group_by_cols: Vec<String>,
    order_by_cols: Vec<String>,
    select_cols: Vec<String>,
    tables: Vec<String>,
    limit: i64,
    offset: i64,
    distinct: bool,
}

impl SelectBuilder {
    fn empty() -> Self {
        Self {
            cond: Cond::new(Dialect::default()),
            order: "",
            for_what: "",
            having_exprs: Vec::new(),
            join_options: Vec::new(),
            join_tables: Vec::new(),
            join_exprs: Vec::new(),
            where_exprs: Vec::new(),
            group_by_cols: Vec::new(),
            order_by_cols: Vec::new(),
            select_cols: Vec::new(),
            tables: Vec::new(),
            limit: -1,
            offset: -1,
            distinct: false,
        }
    }

    /// New SELECT builder over a table
    pub fn query(table: impl Into<String>) -> Self {
        let mut b = Self::empty();
        b.tables = vec![table.into()];
        b
    }

    /// New SELECT builder with an initial column list
    pub fn select<I, S>(cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut b = Self::empty();
        b.set_select(cols);
        b
    }

    /// Set the compilation dialect. Call this before composing conditions:
    /// field quoting happens when a fragment is produced.
    pub fn set_dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.cond.set_dialect(dialect);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.cond.dialect()
    }

    /// Mark this SELECT as DISTINCT
    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    /// Set table names in SELECT
    pub fn from<I, S>(&mut self, tables: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Set columns in SELECT. A single comma-separated string is split on
    /// `,` unless it begins with `(` (kept intact as an expression).
    pub fn set_select<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_cols.clear();
        for col in cols {
            let col = col.into();
            if col.starts_with('(') {
                self.select_cols.push(col);
                continue;
            }
            self.select_cols
                .extend(col.split(',').map(|c| c.trim().to_string()));
        }
        self
    }

    /// Set expressions of JOIN in SELECT
    pub fn join<I, S>(&mut self, table: impl Into<String>, on_exprs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.join_inner(None, table.into(), on_exprs)
    }

    /// Set expressions of JOIN with an option
    pub fn join_with_option<I, S>(
        &mut self,
        option: JoinOption,
        table: impl Into<String>,
        on_exprs: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.join_inner(Some(option), table.into(), on_exprs)
    }

    fn join_inner<I, S>(&mut self, option: Option<JoinOption>, table: String, on_exprs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.join_options.push(option);
        self.join_tables.push(table);
        self.join_exprs
            .push(on_exprs.into_iter().map(Into::into).collect());
        self
    }

    /// Append a WHERE expression; expressions are joined by AND
    pub fn and_where(&mut self, expr: impl Into<String>) -> &mut Self {
        let expr = expr.into();
        if !expr.is_empty() {
            self.where_exprs.push(expr);
        }
        self
    }

    /// Append a HAVING expression
    pub fn having(&mut self, expr: impl Into<String>) -> &mut Self {
        self.having_exprs.push(expr.into());
        self
    }

    /// Append GROUP BY columns
    pub fn group_by(&mut self, col: impl Into<String>) -> &mut Self {
        self.group_by_cols.push(col.into());
        self
    }

    /// Append ORDER BY columns; an empty call clears them
    pub fn order_by<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut it = cols.into_iter().peekable();
        if it.peek().is_none() {
            self.order_by_cols.clear();
            return self;
        }
        self.order_by_cols.extend(it.map(Into::into));
        self
    }

    /// Set order of ORDER BY to ASC
    pub fn asc(&mut self) -> &mut Self {
        self.order = "ASC";
        self
    }

    /// Set order of ORDER BY to DESC
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

    /// Add FOR UPDATE at the end of the statement
    pub fn for_update(&mut self) -> &mut Self {
        self.for_what = "UPDATE";
        self
    }

    /// Add FOR SHARE at the end of the statement
    pub fn for_share(&mut self) -> &mut Self {
        self.for_what = "SHARE";
        self
    }

    /// An AS expression
    pub fn as_alias(name: impl Into<String>, alias: &str) -> String {
        let name = name.into();
        if alias.is_empty() {
            return name;
        }
        format!("{} AS {}", name, alias)
    }

    /// An AS expression wrapping a sub-builder's compiled SQL
    pub fn builder_as(&mut self, builder: impl Builder + 'static, alias: &str) -> String {
        format!(
            "({}) AS {}",
            self.cond.var(ArgValue::Builder(Box::new(builder))),
            alias
        )
    }

    /// Whether the query risks a full table scan (single table, no WHERE,
    /// no JOIN predicates, unlimited range)
    pub fn safety(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(sqlrelay_core::DbError::Exception(
                "select safety error: no tables specified".to_string(),
            ));
        }
        Ok(())
    }

    fn full_scan_risk(&self) -> bool {
        self.tables.len() == 1
            && self.where_exprs.is_empty()
            && self.join_exprs.iter().all(|e| e.is_empty())
            && self.limit < 0
    }

    fn draft(&self, dialect: Dialect) -> String {
        let mut buf = String::with_capacity(256);
        buf.push_str("SELECT ");

        if self.distinct {
            buf.push_str("DISTINCT ");
        }

        if self.select_cols.is_empty() {
            buf.push('*');
        } else {
            buf.push_str(&dialect.quote_cols(&self.select_cols).join(", "));
        }

        buf.push_str(" FROM ");
        buf.push_str(&dialect.quote_cols(&self.tables).join(", "));

        for i in 0..self.join_tables.len() {
            if let Some(option) = self.join_options[i] {
                buf.push(' ');
                buf.push_str(option.as_str());
            }
            buf.push_str(" JOIN ");
            buf.push_str(&self.join_tables[i]);

            let exprs = &self.join_exprs[i];
            if !exprs.is_empty() {
                buf.push_str(" ON ");
                buf.push_str(&exprs.join(" AND "));
            }
        }

        if !self.where_exprs.is_empty() {
            buf.push_str(" WHERE ");
            buf.push_str(&self.where_exprs.join(" AND "));
        }

        if !self.group_by_cols.is_empty() {
            buf.push_str(" GROUP BY ");
            buf.push_str(&self.group_by_cols.join(", "));

            if !self.having_exprs.is_empty() {
                buf.push_str(" HAVING ");
                buf.push_str(&self.having_exprs.join(" AND "));
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

        match dialect {
            Dialect::PostgreSQL => {
                if self.limit > 0 {
                    buf.push_str(&format!(" LIMIT {}", self.limit));
                }
                if self.offset > 0 {
                    buf.push_str(&format!(" OFFSET {}", self.offset));
                }
            }
            Dialect::MsSQL => {
                if self.order_by_cols.is_empty() && (self.limit >= 0 || self.offset >= 0) {
                    buf.push_str(" ORDER BY 1");
                }
                if self.offset > 0 {
                    buf.push_str(&format!(" OFFSET {} ROWS", self.offset));
                }
                if self.limit > 0 {
                    if self.offset <= 0 {
                        buf.push_str(" OFFSET 0 ROWS");
                    }
                    buf.push_str(&format!(" FETCH NEXT {} ROWS ONLY", self.limit));
                }
            }
            _ => {
                if self.limit > 0 {
                    buf.push_str(&format!(" LIMIT {}", self.limit));
                    if self.offset > 0 {
                        buf.push_str(&format!(" OFFSET {}", self.offset));
                    }
                }
            }
        }

        if !self.for_what.is_empty() {
            buf.push_str(" FOR ");
            buf.push_str(self.for_what);
        }

        buf
    }
}

impl Builder for SelectBuilder {
    fn build(&self) -> Result<(String, Vec<Value>)> {
        if self.full_scan_risk() {
            tracing::warn!(
                table = %self.tables[0],
                "select may result in full table scan (no WHERE clause or LIMIT)"
            );
        }
        self.cond.args.compile(&self.draft(self.cond.dialect()))
    }

    fn compile_into(&self, dialect: Dialect, values: &mut Vec<Value>) -> Result<String> {
        self.cond
            .args
            .compile_into(&self.draft(dialect), dialect, values)
    }

    fn to_sql_string(&self) -> String {
        self.cond.args.compile_string(&self.draft(self.cond.dialect()))
    }
}

impl From<SelectBuilder> for ArgValue {
    fn from(b: SelectBuilder) -> Self {
        ArgValue::Builder(Box::new(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn select_composition_mysql() {
        let mut sb = SelectBuilder::select(["id", "username", "count(*) as count"]);
        sb.set_dialect(Dialect::MySQL);
        sb.from(["user"]);
        let ge = sb.cond.ge("age", 18);
        let le = sb.cond.le("age", 38);
        let name = format!("username = {}", sb.cond.var("manage"));
        sb.and_where(ge).and_where(le).and_where(name);
        sb.order_by(["id"]).desc();

        let (sql, values) = sb.build().unwrap();
        assert_eq!(
            sql,
            "SELECT `id`, `username`, count(*) as count FROM `user` WHERE `age` >= ? AND `age` <= ? AND username = ? ORDER BY id DESC"
        );
        assert_eq!(
            values,
            vec![Value::Int(18), Value::Int(38), Value::String("manage".into())]
        );
    }

    #[test]
    fn comma_separated_columns_split() {
        let mut sb = SelectBuilder::select(["id,username"]);
        sb.set_dialect(Dialect::MySQL).from(["user"]);
        let (sql, _) = sb.build().unwrap();
        assert_eq!(sql, "SELECT `id`, `username` FROM `user`");
    }

    #[test]
    fn function_expression_kept_intact() {
        let mut sb = SelectBuilder::select(["(SELECT 1, 2)"]);
        sb.set_dialect(Dialect::MySQL).from(["user"]);
        let (sql, _) = sb.build().unwrap();
        assert_eq!(sql, "SELECT (SELECT 1, 2) FROM `user`");
    }

    #[test]
    fn pagination_per_dialect() {
        let make = |dialect| {
            let mut sb = SelectBuilder::select(["*"]);
            sb.set_dialect(dialect).from(["user"]).offset(10).limit(10);
            sb.build().unwrap().0
        };
        assert_eq!(
            make(Dialect::MsSQL),
            "SELECT * FROM \"user\" ORDER BY 1 OFFSET 10 ROWS FETCH NEXT 10 ROWS ONLY"
        );
        assert_eq!(make(Dialect::MySQL), "SELECT * FROM `user` LIMIT 10 OFFSET 10");
        assert_eq!(
            make(Dialect::SQLite),
            "SELECT * FROM \"user\" LIMIT 10 OFFSET 10"
        );
        assert_eq!(
            make(Dialect::PostgreSQL),
            "SELECT * FROM \"user\" LIMIT 10 OFFSET 10"
        );
    }

    #[test]
    fn postgres_offset_without_limit() {
        let mut sb = SelectBuilder::select(["*"]);
        sb.set_dialect(Dialect::PostgreSQL).from(["user"]).offset(10);
        let (sql, _) = sb.build().unwrap();
        assert_eq!(sql, "SELECT * FROM \"user\" OFFSET 10");

        // the default family only emits OFFSET alongside a positive LIMIT
        let mut sb = SelectBuilder::select(["*"]);
        sb.set_dialect(Dialect::SQLite).from(["user"]).offset(10);
        let (sql, _) = sb.build().unwrap();
        assert_eq!(sql, "SELECT * FROM \"user\"");
    }

    #[test]
    fn mssql_limit_only_defaults_offset() {
        let mut sb = SelectBuilder::select(["*"]);
        sb.set_dialect(Dialect::MsSQL).from(["user"]).limit(5);
        let (sql, _) = sb.build().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"user\" ORDER BY 1 OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
        );
    }

    #[test]
    fn join_with_option() {
        let mut sb = SelectBuilder::select(["*"]);
        sb.set_dialect(Dialect::MySQL);
        sb.from([SelectBuilder::as_alias("user", "u")]);
        let on_like = sb.cond.like("r.alias", "M%");
        let eq = sb.cond.eq("u.username", "manage");
        sb.join("log l", ["u.id = l.uid"]);
        sb.join_with_option(
            JoinOption::RightOuter,
            SelectBuilder::as_alias("role", "r"),
            ["u.id = r.uid".to_string(), on_like],
        );
        sb.and_where(eq);

        let (sql, values) = sb.build().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM `user` AS u JOIN log l ON u.id = l.uid RIGHT OUTER JOIN role AS r ON u.id = r.uid AND `r`.`alias` LIKE ? WHERE `u`.`username` = ?"
        );
        assert_eq!(
            values,
            vec![Value::String("M%".into()), Value::String("manage".into())]
        );
    }

    #[test]
    fn nested_select_in_from() {
        let mut child = SelectBuilder::select(["*"]);
        child.set_dialect(Dialect::SQLite).from(["user"]);
        let ge = child.cond.ge("id", 1);
        child.and_where(ge);

        let mut sb = SelectBuilder::select(["*"]);
        sb.set_dialect(Dialect::SQLite);
        let sub = sb.builder_as(child, "u");
        sb.from([sub]);
        let eq = sb.cond.eq("age", 18);
        sb.and_where(eq);

        let (sql, values) = sb.build().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT * FROM \"user\" WHERE \"id\" >= ?) AS u WHERE \"age\" = ?"
        );
        assert_eq!(values, vec![Value::Int(1), Value::Int(18)]);
    }

    #[test]
    fn nested_select_in_where_keeps_argument_order() {
        let mut child = SelectBuilder::select(["*"]);
        child.set_dialect(Dialect::SQLite).from(["user"]);
        let ge = child.cond.ge("id", 1);
        child.and_where(ge);

        let mut sb = SelectBuilder::select(["*"]);
        sb.set_dialect(Dialect::SQLite);
        let in_expr = sb.cond.is_in("id", [child]);
        sb.from(["user"]);
        let eq = sb.cond.eq("age", 108);
        sb.and_where(in_expr).and_where(eq);

        let (sql, values) = sb.build().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"user\" WHERE \"id\" IN (SELECT * FROM \"user\" WHERE \"id\" >= ?) AND \"age\" = ?"
        );
        assert_eq!(values, vec![Value::Int(1), Value::Int(108)]);
    }

    #[test]
    fn nested_select_renumbers_for_postgres() {
        let mut child = SelectBuilder::select(["*"]);
        child.set_dialect(Dialect::PostgreSQL).from(["user"]);
        let ge = child.cond.ge("id", 1);
        child.and_where(ge);

        let mut sb = SelectBuilder::select(["*"]);
        sb.set_dialect(Dialect::PostgreSQL);
        sb.from(["user"]);
        let eq = sb.cond.eq("age", 7);
        let in_expr = sb.cond.is_in("id", [child]);
        sb.and_where(eq).and_where(in_expr);

        let (sql, values) = sb.build().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"user\" WHERE \"age\" = $1 AND \"id\" IN (SELECT * FROM \"user\" WHERE \"id\" >= $2)"
        );
        assert_eq!(values, vec![Value::Int(7), Value::Int(1)]);
    }

    #[test]
    fn group_by_having_distinct() {
        let mut sb = SelectBuilder::select(["id", "username", "group_id"]);
        sb.set_dialect(Dialect::MySQL).from(["user"]);
        let ge = sb.cond.ge("group_id", 1);
        sb.group_by("group_id").having(ge).distinct();
        let (sql, _) = sb.build().unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT `id`, `username`, `group_id` FROM `user` GROUP BY group_id HAVING `group_id` >= ?"
        );
    }

    #[test]
    fn for_update_suffix() {
        let mut sb = SelectBuilder::query("user");
        sb.set_dialect(Dialect::MySQL);
        let eq = sb.cond.eq("id", 1);
        sb.and_where(eq).for_update();
        let (sql, _) = sb.build().unwrap();
        assert_eq!(sql, "SELECT * FROM `user` WHERE `id` = ? FOR UPDATE");
    }

    #[test]
    fn to_sql_string_inlines() {
        let mut sb = SelectBuilder::query("user");
        sb.set_dialect(Dialect::MySQL);
        let eq = sb.cond.eq("name", "it's");
        sb.and_where(eq);
        assert_eq!(
            sb.to_sql_string(),
            "SELECT * FROM `user` WHERE `name` = 'it''s'"
        );
    }
}
