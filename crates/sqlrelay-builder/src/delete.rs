//! DELETE builder

use crate::Builder;
use crate::args::escape;
use crate::cond::Cond;
use crate::update::where_order_statement;
use sqlrelay_core::{DbError, Dialect, Result, Value};

/// A builder to build DELETE
pub struct DeleteBuilder {
    pub cond: Cond,
    table: String,
    order: &'static str,
    where_exprs: Vec<String>,
    order_by_cols: Vec<String>,
    limit: i64,
    limit_col: String,
    allow_empty: bool,
}

impl DeleteBuilder {
    /// New DELETE builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            cond: Cond::new(Dialect::default()),
            table: escape(&table.into()),
            order: "",
            where_exprs: Vec::new(),
            order_by_cols: Vec::new(),
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

    fn draft(&self, dialect: Dialect) -> String {
        let mut buf = String::with_capacity(128);

        buf.push_str("DELETE FROM ");
        buf.push_str(&dialect.quote(&self.table));

        let tail = where_order_statement(dialect, &self.where_exprs, &self.order_by_cols, self.order);

        if self.limit >= 0 {
            if dialect.supports_update_limit() {
                buf.push_str(&tail);
                buf.push_str(&format!(" LIMIT {}", self.limit));
            } else {
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

        buf
    }
}

impl Builder for DeleteBuilder {
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
