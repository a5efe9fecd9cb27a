//! UPDATE builder

use crate::Builder;
use crate::args::{ArgValue, escape};
use crate::cond::Cond;
use sqlrelay_core::{DbError, Dialect, Result, Value};

/// Builds the shared ` WHERE …`/` ORDER BY …` tail used by UPDATE and
/// DELETE, quoting the order columns with the active dialect.
pub(crate) fn where_order_statement(
    dialect: Dialect,
    where_exprs: &[String],
    order_by_cols: &[String],
    order: &str,
) -> String {
    let mut buf = String::new();
    if !where_exprs.is_empty() {
        buf.push_str(" WHERE ");
        buf.push_str(&where_exprs.join(" AND "));
    }
    if !order_by_cols.is_empty() {
        buf.push_str(" ORDER BY ");
        buf.push_str(&dialect.quote_cols(order_by_cols).join(", "));
        if !order.is_empty() {
            buf.push(' ');
            buf.push_str(order);
        }
    }
    buf
}

/// A builder to build UPDATE
pub struct UpdateBuilder {
    pub cond: Cond,
    table: String,
    order: &'static str,
    assignments: Vec<String>,
    where_exprs: Vec<String>,
    order_by_cols: Vec<String>,
    options: Vec<Vec<String>>,
    limit: i64,
    limit_col: String,
    allow_empty: bool,
}

impl UpdateBuilder {
    /// New UPDATE builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            cond: Cond::new(Dialect::default()),
            table: escape(&table.into()),
            order: "",
            assignments: Vec::new(),
            where_exprs: Vec::new(),
            order_by_cols: Vec::new(),
            options: Vec::new(),
            limit: -1,
            limit_col: "id".to_string(),
            allow_empty: false,
        }
    }

    /// Set the compilation dialect
    pub fn set_dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.cond.set_dialect(dialect);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.cond.dialect()
    }

    /// Replace the assignments in SET
    pub fn set<I, S>(&mut self, assignments: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assignments = assignments.into_iter().map(Into::into).collect();
        self
    }

    /// Append assignments in SET
    pub fn set_more(&mut self, assignment: impl Into<String>) -> &mut Self {
        self.assignments.push(assignment.into());
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

    /// Permit building without a WHERE clause
    pub fn allow_empty(&mut self) -> &mut Self {
        self.allow_empty = true;
        self
    }

    /// `field = value`
    pub fn assign(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        self.cond.cond(field, " = ", value)
    }

    /// `field = field + 1`
    pub fn incr(&mut self, field: &str) -> String {
        let f = self.cond.quote_field(field);
        format!("{f} = {f} + 1")
    }

    /// `field = field - 1`
    pub fn decr(&mut self, field: &str) -> String {
        let f = self.cond.quote_field(field);
        format!("{f} = {f} - 1")
    }

    /// `field = field + value`
    pub fn add(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        let f = self.cond.quote_field(field);
        format!("{f} = {f} + {}", self.cond.var(value))
    }

    /// `field = field - value`
    pub fn sub(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        let f = self.cond.quote_field(field);
        format!("{f} = {f} - {}", self.cond.var(value))
    }

    /// `field = field * value`
    pub fn mul(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        let f = self.cond.quote_field(field);
        format!("{f} = {f} * {}", self.cond.var(value))
    }

    /// `field = field / value`
    pub fn div(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        let f = self.cond.quote_field(field);
        format!("{f} = {f} / {}", self.cond.var(value))
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

    /// Column used by the LIMIT emulation sub-query instead of `id`
    pub fn limit_by(&mut self, col: impl Into<String>) -> &mut Self {
        self.limit_col = col.into();
        self
    }

    pub fn option<I, S>(&mut self, opt: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.push(opt.into_iter().map(Into::into).collect());
        self
    }

    fn draft(&self, dialect: Dialect) -> String {
        let mut buf = String::with_capacity(256);

        buf.push_str("UPDATE ");
        buf.push_str(&dialect.quote(&self.table));

        buf.push_str(" SET ");
        buf.push_str(&self.assignments.join(", "));

        let tail = where_order_statement(dialect, &self.where_exprs, &self.order_by_cols, self.order);

        if self.limit >= 0 {
            if dialect.supports_update_limit() {
                buf.push_str(&tail);
                buf.push_str(&format!(" LIMIT {}", self.limit));
            } else {
                // engines without UPDATE … LIMIT get the id-subquery form
                buf.push_str(" WHERE ");
                buf.push_str(&self.limit_col);
                buf.push_str(" IN (SELECT ");
                buf.push_str(&self.limit_col);
                buf.push_str(" FROM ");
                buf.push_str(&dialect.quote(&self.table));
                buf.push_str(&tail);
                buf.push_str(&format!(" LIMIT {})", self.limit));
            }
        } else {
            buf.push_str(&tail);
        }

        if !self.options.is_empty() {
            buf.push(' ');
            let opts: Vec<String> = self.options.iter().map(|o| o.join(" ")).collect();
            buf.push_str(&opts.join(", "));
        }

        buf
    }
}

impl Builder for UpdateBuilder {
    fn build(&self) -> Result<(String, Vec<Value>)> {
        if self.where_exprs.is_empty() && !self.allow_empty {
            return Err(DbError::NoWhere);
        }
        self.cond.args.compile(&self.draft(self.cond.dialect()))
    }

    fn compile_into(&self, dialect: Dialect, values: &mut Vec<Value>) -> Result<String> {
        if self.where_exprs.is_empty() && !self.allow_empty {
            return Err(DbError::NoWhere);
        }
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

    #[test]
    fn update_basic() {
        let mut ub = UpdateBuilder::new("user");
        ub.set_dialect(Dialect::MySQL);
        let a = ub.assign("status", 1);
        let w = ub.cond.eq("id", 7);
        ub.set([a]).and_where(w);

        let (sql, values) = ub.build().unwrap();
        assert_eq!(sql, "UPDATE `user` SET `status` = ? WHERE `id` = ?");
        assert_eq!(values, vec![Value::Int(1), Value::Int(7)]);
    }

    #[test]
    fn update_without_where_fails() {
        let mut ub = UpdateBuilder::new("user");
        let a = ub.assign("status", 1);
        ub.set([a]);
        assert!(matches!(ub.build().unwrap_err(), DbError::NoWhere));
    }

    #[test]
    fn update_allow_empty_bypasses_guard() {
        let mut ub = UpdateBuilder::new("user");
        ub.set_dialect(Dialect::MySQL);
        let a = ub.assign("status", 1);
        ub.set([a]).allow_empty();
        let (sql, _) = ub.build().unwrap();
        assert_eq!(sql, "UPDATE `user` SET `status` = ?");
    }

    #[test]
    fn assignment_helpers() {
        let mut ub = UpdateBuilder::new("user");
        ub.set_dialect(Dialect::MySQL);
        assert_eq!(ub.incr("n"), "`n` = `n` + 1");
        assert_eq!(ub.decr("n"), "`n` = `n` - 1");
        assert_eq!(ub.add("n", 5), "`n` = `n` + $0");
        assert_eq!(ub.sub("n", 5), "`n` = `n` - $1");
        assert_eq!(ub.mul("n", 2), "`n` = `n` * $2");
        assert_eq!(ub.div("n", 2), "`n` = `n` / $3");
    }

    #[test]
    fn sqlite_limit_emulation() {
        let mut ub = UpdateBuilder::new("user");
        ub.set_dialect(Dialect::SQLite);
        let a = ub.assign("status", 1);
        let w = ub.cond.eq("status", 0);
        ub.set([a]).and_where(w).order_by(["id"]).asc().limit(5);

        let (sql, values) = ub.build().unwrap();
        assert_eq!(
            sql,
            "UPDATE \"user\" SET \"status\" = ? WHERE id IN (SELECT id FROM \"user\" WHERE \"status\" = ? ORDER BY \"id\" ASC LIMIT 5)"
        );
        assert_eq!(values, vec![Value::Int(1), Value::Int(0)]);
    }

    #[test]
    fn mysql_native_limit() {
        let mut ub = UpdateBuilder::new("user");
        ub.set_dialect(Dialect::MySQL);
        let a = ub.assign("status", 1);
        let w = ub.cond.eq("status", 0);
        ub.set([a]).and_where(w).order_by(["id"]).asc().limit(5);

        let (sql, _) = ub.build().unwrap();
        assert_eq!(
            sql,
            "UPDATE `user` SET `status` = ? WHERE `status` = ? ORDER BY `id` ASC LIMIT 5"
        );
    }

    #[test]
    fn limit_by_overrides_emulation_column() {
        let mut ub = UpdateBuilder::new("user");
        ub.set_dialect(Dialect::PostgreSQL);
        let a = ub.assign("status", 1);
        let w = ub.cond.eq("status", 0);
        ub.set([a]).and_where(w).limit(3).limit_by("uid");

        let (sql, _) = ub.build().unwrap();
        assert_eq!(
            sql,
            "UPDATE \"user\" SET \"status\" = $1 WHERE uid IN (SELECT uid FROM \"user\" WHERE \"status\" = $2 LIMIT 3)"
        );
    }
}
