//! Condition helpers
//!
//! Each helper produces a SQL fragment string and registers its operands
//! with the argument compiler. Composition is purely textual; no SQL is
//! ever parsed.

use crate::args::{ArgValue, Args, escape};
use sqlrelay_core::Dialect;

/// Helper handle owning the argument compiler of a builder
pub struct Cond {
    pub(crate) args: Args,
}

impl Cond {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            args: Args::new(dialect),
        }
    }

    pub fn new_named(dialect: Dialect) -> Self {
        Self {
            args: Args::new_named(dialect),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.args.dialect()
    }

    pub(crate) fn set_dialect(&mut self, dialect: Dialect) {
        self.args.set_dialect(dialect);
    }

    /// Escape and quote a field name with the active dialect
    pub(crate) fn quote_field(&self, field: &str) -> String {
        self.args.dialect().quote(&escape(field))
    }

    /// Returns a placeholder for `value`
    pub fn var(&mut self, value: impl Into<ArgValue>) -> String {
        self.args.var(value)
    }

    /// Generic condition: `<quoted_field><op><placeholder>`. A raw value is
    /// emitted parenthesized instead of bound.
    pub fn cond(&mut self, field: &str, op: &str, value: impl Into<ArgValue>) -> String {
        let quoted = self.quote_field(field);
        match value.into() {
            ArgValue::Raw(expr) => format!("{}{}({})", quoted, op, expr),
            other => format!("{}{}{}", quoted, op, self.args.var(other)),
        }
    }

    /// `field = value`
    pub fn eq(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        self.cond(field, " = ", value)
    }

    /// `field <> value`
    pub fn ne(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        self.cond(field, " <> ", value)
    }

    /// `field > value`
    pub fn gt(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        self.cond(field, " > ", value)
    }

    /// `field >= value`
    pub fn ge(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        self.cond(field, " >= ", value)
    }

    /// `field < value`
    pub fn lt(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        self.cond(field, " < ", value)
    }

    /// `field <= value`
    pub fn le(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        self.cond(field, " <= ", value)
    }

    /// `field IN (v1, …, vn)`; an empty list degenerates to `1 = 0`
    pub fn is_in<I, T>(&mut self, field: &str, values: I) -> String
    where
        I: IntoIterator<Item = T>,
        T: Into<ArgValue>,
    {
        let placeholders: Vec<String> = values.into_iter().map(|v| self.args.var(v)).collect();
        if placeholders.is_empty() {
            return "1 = 0".to_string();
        }
        format!("{} IN ({})", self.quote_field(field), placeholders.join(", "))
    }

    /// `field NOT IN (v1, …, vn)`; an empty list degenerates to `1 = 1`
    pub fn not_in<I, T>(&mut self, field: &str, values: I) -> String
    where
        I: IntoIterator<Item = T>,
        T: Into<ArgValue>,
    {
        let placeholders: Vec<String> = values.into_iter().map(|v| self.args.var(v)).collect();
        if placeholders.is_empty() {
            return "1 = 1".to_string();
        }
        format!(
            "{} NOT IN ({})",
            self.quote_field(field),
            placeholders.join(", ")
        )
    }

    /// `field LIKE value`
    pub fn like(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        self.cond(field, " LIKE ", value)
    }

    /// `field NOT LIKE value`
    pub fn not_like(&mut self, field: &str, value: impl Into<ArgValue>) -> String {
        self.cond(field, " NOT LIKE ", value)
    }

    /// `field IS NULL`
    pub fn is_null(&mut self, field: &str) -> String {
        format!("{} IS NULL", self.quote_field(field))
    }

    /// `field IS NOT NULL`
    pub fn is_not_null(&mut self, field: &str) -> String {
        format!("{} IS NOT NULL", self.quote_field(field))
    }

    /// `field BETWEEN lower AND upper`
    pub fn between(
        &mut self,
        field: &str,
        lower: impl Into<ArgValue>,
        upper: impl Into<ArgValue>,
    ) -> String {
        format!(
            "{} BETWEEN {} AND {}",
            self.quote_field(field),
            self.args.var(lower),
            self.args.var(upper)
        )
    }

    /// `field NOT BETWEEN lower AND upper`
    pub fn not_between(
        &mut self,
        field: &str,
        lower: impl Into<ArgValue>,
        upper: impl Into<ArgValue>,
    ) -> String {
        format!(
            "{} NOT BETWEEN {} AND {}",
            self.quote_field(field),
            self.args.var(lower),
            self.args.var(upper)
        )
    }

    /// `(expr1 AND expr2 …)`
    pub fn and<I, S>(&self, exprs: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        join_exprs(exprs, " AND ")
    }

    /// `(expr1 OR expr2 …)`
    pub fn or<I, S>(&self, exprs: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        join_exprs(exprs, " OR ")
    }
}

fn join_exprs<I, S>(exprs: I, sep: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = exprs
        .into_iter()
        .map(|e| e.as_ref().to_string())
        .collect();
    if parts.is_empty() {
        return String::new();
    }
    format!("({})", parts.join(sep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::raw;
    use pretty_assertions::assert_eq;

    fn mysql() -> Cond {
        Cond::new(Dialect::MySQL)
    }

    #[test]
    fn fragments() {
        assert_eq!(mysql().eq("a", 1), "`a` = $0");
        assert_eq!(mysql().ne("a", 1), "`a` <> $0");
        assert_eq!(mysql().gt("a", 1), "`a` > $0");
        assert_eq!(mysql().ge("a", 1), "`a` >= $0");
        assert_eq!(mysql().lt("a", 1), "`a` < $0");
        assert_eq!(mysql().le("a", 1), "`a` <= $0");
        assert_eq!(mysql().like("a", "3%"), "`a` LIKE $0");
        assert_eq!(mysql().not_like("a", "3%"), "`a` NOT LIKE $0");
        assert_eq!(mysql().is_null("a"), "`a` IS NULL");
        assert_eq!(mysql().is_not_null("a"), "`a` IS NOT NULL");
        assert_eq!(mysql().between("a", 1, 2), "`a` BETWEEN $0 AND $1");
        assert_eq!(mysql().not_between("a", 1, 2), "`a` NOT BETWEEN $0 AND $1");
        assert_eq!(mysql().is_in("a", [1, 2, 3]), "`a` IN ($0, $1, $2)");
        assert_eq!(mysql().not_in("a", [1, 2]), "`a` NOT IN ($0, $1)");
    }

    #[test]
    fn dollar_in_field_is_escaped() {
        assert_eq!(mysql().eq("$a", 1), "`$$a` = $0");
    }

    #[test]
    fn empty_in_lists_degenerate() {
        assert_eq!(mysql().is_in("a", Vec::<i64>::new()), "1 = 0");
        assert_eq!(mysql().not_in("a", Vec::<i64>::new()), "1 = 1");
    }

    #[test]
    fn and_or_edges() {
        let c = mysql();
        assert_eq!(c.and(["1=2", "3=4"]), "(1=2 AND 3=4)");
        assert_eq!(c.or(["1=2", "3=4"]), "(1=2 OR 3=4)");
        assert_eq!(c.and(["1=2"]), "(1=2)");
        assert_eq!(c.and(Vec::<String>::new()), "");
    }

    #[test]
    fn raw_value_in_cond_is_parenthesized() {
        let mut c = mysql();
        assert_eq!(
            c.cond("created", " > ", raw("NOW() - INTERVAL 1 DAY")),
            "`created` > (NOW() - INTERVAL 1 DAY)"
        );
    }
}
