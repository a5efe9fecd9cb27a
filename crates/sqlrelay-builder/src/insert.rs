//! INSERT / REPLACE builder

use crate::Builder;
use crate::args::{ArgValue, escape_all};
use crate::cond::Cond;
use sqlrelay_core::{DbError, Dialect, Result, Value};

/// A builder to build INSERT
pub struct InsertBuilder {
    pub cond: Cond,
    verb: &'static str,
    table: String,
    cols: Vec<String>,
    values: Vec<Vec<String>>,
    options: Vec<Vec<String>>,
}

impl InsertBuilder {
    fn with_verb(verb: &'static str, table: String) -> Self {
        Self {
            cond: Cond::new(Dialect::default()),
            verb,
            table,
            cols: Vec::new(),
            values: Vec::new(),
            options: Vec::new(),
        }
    }

    /// New INSERT builder
    pub fn insert(table: impl Into<String>) -> Self {
        Self::with_verb("INSERT", table.into())
    }

    /// New REPLACE builder (MySQL extension to the SQL standard)
    pub fn replace(table: impl Into<String>) -> Self {
        Self::with_verb("REPLACE", table.into())
    }

    /// New INSERT IGNORE builder
    pub fn insert_ignore(table: impl Into<String>) -> Self {
        Self::with_verb("INSERT IGNORE", table.into())
    }

    /// Set the compilation dialect
    pub fn set_dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.cond.set_dialect(dialect);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.cond.dialect()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Set columns in INSERT
    pub fn cols<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cols = escape_all(cols);
        self
    }

    /// Add a list of values for one row
    pub fn values<I, T>(&mut self, row: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ArgValue>,
    {
        let placeholders: Vec<String> = row.into_iter().map(|v| self.cond.var(v)).collect();
        self.values.push(placeholders);
        self
    }

    /// Add value rows for a batch
    pub fn batch_values<I, R, T>(&mut self, rows: I) -> &mut Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = T>,
        T: Into<ArgValue>,
    {
        for row in rows {
            self.values(row);
        }
        self
    }

    /// Add a post-clause option (e.g. `ON DUPLICATE KEY UPDATE …`)
    pub fn option<I, S>(&mut self, opt: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.push(opt.into_iter().map(Into::into).collect());
        self
    }

    /// Returns a placeholder for `value`
    pub fn var(&mut self, value: impl Into<ArgValue>) -> String {
        self.cond.var(value)
    }

    fn check(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(DbError::DataInvalid("insert: no table specified".into()));
        }
        if self.cols.is_empty() || self.values.is_empty() {
            return Err(DbError::InsertEmpty);
        }
        for row in &self.values {
            if row.len() != self.cols.len() {
                return Err(DbError::DataInvalid(format!(
                    "insert: row arity {} does not match column count {}",
                    row.len(),
                    self.cols.len()
                )));
            }
        }
        Ok(())
    }

    fn draft(&self, dialect: Dialect) -> String {
        let mut buf = String::with_capacity(256);

        buf.push_str(self.verb);
        buf.push_str(" INTO ");
        buf.push_str(&dialect.quote(&self.table));

        if !self.cols.is_empty() {
            buf.push_str(" (");
            buf.push_str(&dialect.quote_cols(&self.cols).join(", "));
            buf.push(')');
        }

        buf.push_str(" VALUES ");
        let rows: Vec<String> = self
            .values
            .iter()
            .map(|row| format!("({})", row.join(", ")))
            .collect();
        buf.push_str(&rows.join(", "));

        if !self.options.is_empty() {
            buf.push(' ');
            let opts: Vec<String> = self.options.iter().map(|o| o.join(" ")).collect();
            buf.push_str(&opts.join(", "));
        }

        buf
    }
}

impl Builder for InsertBuilder {
    fn build(&self) -> Result<(String, Vec<Value>)> {
        self.check()?;
        self.cond.args.compile(&self.draft(self.cond.dialect()))
    }

    fn compile_into(&self, dialect: Dialect, values: &mut Vec<Value>) -> Result<String> {
        self.check()?;
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
    use crate::args::raw;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_postgres() {
        let mut sb = InsertBuilder::insert("user");
        sb.set_dialect(Dialect::PostgreSQL);
        sb.cols(["username", "age"]).values([
            ArgValue::from("new user"),
            ArgValue::from(18),
        ]);

        let (sql, values) = sb.build().unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"user\" (\"username\", \"age\") VALUES ($1, $2)"
        );
        assert_eq!(
            values,
            vec![Value::String("new user".into()), Value::Int(18)]
        );
    }

    #[test]
    fn insert_with_raw_value() {
        let mut sb = InsertBuilder::insert("user");
        sb.set_dialect(Dialect::MySQL);
        sb.cols(["username", "age", "create_at"]).values([
            ArgValue::from("new user"),
            ArgValue::from(18),
            raw("UNIX_TIMESTAMP(NOW())"),
        ]);

        let (sql, values) = sb.build().unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `user` (`username`, `age`, `create_at`) VALUES (?, ?, UNIX_TIMESTAMP(NOW()))"
        );
        assert_eq!(
            values,
            vec![Value::String("new user".into()), Value::Int(18)]
        );
    }

    #[test]
    fn batch_insert_rows() {
        let mut sb = InsertBuilder::insert("user");
        sb.set_dialect(Dialect::MySQL);
        sb.cols(["username", "age"]);
        sb.values([ArgValue::from("new user"), ArgValue::from(18)]);
        sb.values([ArgValue::from("new user2"), ArgValue::from(199)]);

        let (sql, values) = sb.build().unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `user` (`username`, `age`) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn replace_verb() {
        let mut sb = InsertBuilder::replace("user");
        sb.set_dialect(Dialect::MySQL);
        sb.cols(["username", "age"])
            .values([ArgValue::from("new user"), ArgValue::from(18)]);

        let (sql, _) = sb.build().unwrap();
        assert_eq!(sql, "REPLACE INTO `user` (`username`, `age`) VALUES (?, ?)");
    }

    #[test]
    fn on_duplicate_key_option() {
        let mut sb = InsertBuilder::insert("user");
        sb.set_dialect(Dialect::MySQL);
        sb.cols(["username"]).values([ArgValue::from("u")]);
        sb.option(["ON DUPLICATE KEY UPDATE", "username = VALUES(username)"]);

        let (sql, _) = sb.build().unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `user` (`username`) VALUES (?) ON DUPLICATE KEY UPDATE username = VALUES(username)"
        );
    }

    #[test]
    fn empty_insert_fails() {
        let sb = InsertBuilder::insert("user");
        assert!(matches!(sb.build().unwrap_err(), DbError::InsertEmpty));
    }

    #[test]
    fn arity_mismatch_fails() {
        let mut sb = InsertBuilder::insert("user");
        sb.cols(["a", "b"]).values([ArgValue::from(1)]);
        assert!(matches!(sb.build().unwrap_err(), DbError::DataInvalid(_)));
    }
}
