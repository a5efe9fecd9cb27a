//! Argument compiler
//!
//! Builders never emit concrete placeholders while composing. Every
//! registered argument gets an opaque token (`$0`, `$1`, … or `${name}`)
//! that is written into the draft SQL; a single left-to-right pass at
//! build time replaces each token with the dialect's placeholder form and
//! assembles the final argument vector. Because nested sub-builders are
//! compiled into the same output vector, positional numbering (PostgreSQL
//! `$N`, MsSQL `@pN`) stays correct no matter where a fragment ends up in
//! the statement.

use crate::Builder;
use sqlrelay_core::{DbError, Dialect, Result, Value};
use std::collections::HashMap;

/// An argument as registered with the compiler
pub enum ArgValue {
    /// A plain parameter value
    Value(Value),
    /// SQL text spliced in verbatim, never bound
    Raw(String),
    /// A sub-builder whose compiled SQL is spliced in and whose arguments
    /// are appended in order
    Builder(Box<dyn Builder + Send + Sync>),
}

impl From<Value> for ArgValue {
    fn from(v: Value) -> Self {
        ArgValue::Value(v)
    }
}

macro_rules! arg_value_from {
    ($($t:ty),*) => {$(
        impl From<$t> for ArgValue {
            fn from(v: $t) -> Self {
                ArgValue::Value(v.into())
            }
        }
    )*};
}

arg_value_from!(
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, &str, String, Vec<u8>,
    chrono::DateTime<chrono::Utc>, serde_json::Value
);

/// Marks `expr` as raw SQL which will not be added to the argument vector
pub fn raw(expr: impl Into<String>) -> ArgValue {
    ArgValue::Raw(expr.into())
}

/// Creates a named argument
pub fn named(name: impl Into<String>, value: impl Into<Value>) -> ArgValue {
    ArgValue::Value(Value::Named {
        name: name.into(),
        value: Box::new(value.into()),
    })
}

/// Replaces `$` with `$$` in an identifier so user text cannot collide
/// with placeholder tokens
pub fn escape(ident: &str) -> String {
    ident.replace('$', "$$")
}

/// [`escape`] applied to every element
pub fn escape_all<I, S>(idents: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    idents.into_iter().map(|i| escape(i.as_ref())).collect()
}

/// Accumulates argument values during composition and produces the final
/// SQL string plus ordered argument vector at build time.
pub struct Args {
    dialect: Dialect,
    entries: Vec<ArgValue>,
    names: HashMap<String, usize>,
    only_named: bool,
    rejected: Option<String>,
}

impl Args {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            entries: Vec::new(),
            names: HashMap::new(),
            only_named: false,
            rejected: None,
        }
    }

    /// A compiler that accepts only named arguments
    pub fn new_named(dialect: Dialect) -> Self {
        Self {
            only_named: true,
            ..Self::new(dialect)
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn set_dialect(&mut self, dialect: Dialect) {
        self.dialect = dialect;
    }

    /// Register a value and return its placeholder token.
    ///
    /// In named-only mode a positional value poisons the compiler; the
    /// error surfaces from [`Args::compile`] so unexecuted statements still
    /// report it at build time.
    pub fn var(&mut self, value: impl Into<ArgValue>) -> String {
        let entry = value.into();
        let idx = self.entries.len();

        if let ArgValue::Value(Value::Named { name, .. }) = &entry {
            let token = format!("${{{}}}", name);
            self.names.insert(name.clone(), idx);
            self.entries.push(entry);
            return token;
        }

        if self.only_named {
            if let ArgValue::Value(_) = entry {
                self.rejected = Some("positional argument in named-only builder".to_string());
            }
        }

        self.entries.push(entry);
        format!("${}", idx)
    }

    /// Compile the draft using this compiler's own dialect
    pub fn compile(&self, draft: &str) -> Result<(String, Vec<Value>)> {
        let mut values = Vec::with_capacity(self.entries.len());
        let sql = self.compile_into(draft, self.dialect, &mut values)?;
        Ok((sql, values))
    }

    /// Compile the draft with an explicit dialect, appending bound values to
    /// `values`. Placeholder numbering continues from the accumulated
    /// length, which is what keeps nested builds correctly numbered.
    pub fn compile_into(
        &self,
        draft: &str,
        dialect: Dialect,
        values: &mut Vec<Value>,
    ) -> Result<String> {
        if let Some(reason) = &self.rejected {
            return Err(DbError::DataInvalid(reason.clone()));
        }

        let bytes = draft.as_bytes();
        let mut out = String::with_capacity(draft.len());
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'$' {
                let start = i;
                while i < bytes.len() && bytes[i] != b'$' {
                    i += 1;
                }
                out.push_str(&draft[start..i]);
                continue;
            }

            // bytes[i] == '$'
            if i + 1 >= bytes.len() {
                out.push('$');
                break;
            }

            match bytes[i + 1] {
                b'$' => {
                    // escaped dollar from a user identifier
                    out.push('$');
                    i += 2;
                }
                b'{' => {
                    let rest = &draft[i + 2..];
                    match rest.find('}') {
                        Some(end) => {
                            let name = &rest[..end];
                            match self.names.get(name) {
                                Some(&idx) => {
                                    self.splice(idx, dialect, &mut out, values)?;
                                    i += 2 + end + 1;
                                }
                                None => {
                                    out.push('$');
                                    i += 1;
                                }
                            }
                        }
                        None => {
                            out.push('$');
                            i += 1;
                        }
                    }
                }
                c if c.is_ascii_digit() => {
                    let mut end = i + 1;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                    let idx: usize = draft[i + 1..end].parse().unwrap_or(usize::MAX);
                    if idx < self.entries.len() {
                        self.splice(idx, dialect, &mut out, values)?;
                        i = end;
                    } else {
                        // unknown token, copied literally
                        out.push('$');
                        i += 1;
                    }
                }
                _ => {
                    out.push('$');
                    i += 1;
                }
            }
        }

        Ok(out)
    }

    fn splice(
        &self,
        idx: usize,
        dialect: Dialect,
        out: &mut String,
        values: &mut Vec<Value>,
    ) -> Result<()> {
        match &self.entries[idx] {
            ArgValue::Raw(text) => out.push_str(text),
            ArgValue::Builder(b) => {
                let fragment = b.compile_into(dialect, values)?;
                out.push_str(&fragment);
            }
            ArgValue::Value(v) => match (dialect, v) {
                (Dialect::MsSQL, Value::Named { name, .. }) => {
                    out.push('@');
                    out.push_str(name);
                    values.push(v.clone());
                }
                (_, Value::Named { value, .. }) => {
                    values.push((**value).clone());
                    out.push_str(&dialect.placeholder(values.len()));
                }
                _ => {
                    values.push(v.clone());
                    out.push_str(&dialect.placeholder(values.len()));
                }
            },
        }
        Ok(())
    }

    /// Compile the draft with values inlined as literals. Intended for
    /// logging only; the result must never be sent to the database.
    pub fn compile_string(&self, draft: &str) -> String {
        let bytes = draft.as_bytes();
        let mut out = String::with_capacity(draft.len());
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'$' {
                let start = i;
                while i < bytes.len() && bytes[i] != b'$' {
                    i += 1;
                }
                out.push_str(&draft[start..i]);
                continue;
            }
            if i + 1 >= bytes.len() {
                out.push('$');
                break;
            }
            match bytes[i + 1] {
                b'$' => {
                    out.push('$');
                    i += 2;
                }
                b'{' => {
                    let rest = &draft[i + 2..];
                    match rest.find('}') {
                        Some(end) if self.names.contains_key(&rest[..end]) => {
                            let idx = self.names[&rest[..end]];
                            self.splice_literal(idx, &mut out);
                            i += 2 + end + 1;
                        }
                        _ => {
                            out.push('$');
                            i += 1;
                        }
                    }
                }
                c if c.is_ascii_digit() => {
                    let mut end = i + 1;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                    let idx: usize = draft[i + 1..end].parse().unwrap_or(usize::MAX);
                    if idx < self.entries.len() {
                        self.splice_literal(idx, &mut out);
                        i = end;
                    } else {
                        out.push('$');
                        i += 1;
                    }
                }
                _ => {
                    out.push('$');
                    i += 1;
                }
            }
        }

        out
    }

    fn splice_literal(&self, idx: usize, out: &mut String) {
        match &self.entries[idx] {
            ArgValue::Raw(text) => out.push_str(text),
            ArgValue::Builder(b) => out.push_str(&b.to_sql_string()),
            ArgValue::Value(v) => out.push_str(&sql_literal(v)),
        }
    }
}

/// Render a value as a SQL literal for the debug/logging path
pub(crate) fn sql_literal(v: &Value) -> String {
    match v {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Uint(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|x| format!("{:02X}", x)).collect();
            format!("X'{}'", hex)
        }
        Value::Time(t) => format!("'{}'", t.format("%Y-%m-%d %H:%M:%S")),
        Value::Json(j) => format!("'{}'", j.to_string().replace('\'', "''")),
        Value::Named { value, .. } => sql_literal(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn positional_tokens_are_sequential() {
        let mut args = Args::new(Dialect::MySQL);
        assert_eq!(args.var(1), "$0");
        assert_eq!(args.var("two"), "$1");
        assert_eq!(args.var(3.0), "$2");
    }

    #[test]
    fn named_tokens_use_braces() {
        let mut args = Args::new(Dialect::MySQL);
        assert_eq!(args.var(named("age", 18)), "${age}");
    }

    #[test]
    fn compile_default_placeholders() {
        let mut args = Args::new(Dialect::MySQL);
        let t0 = args.var(18);
        let t1 = args.var("x");
        let (sql, values) = args
            .compile(&format!("a = {} AND b = {}", t0, t1))
            .unwrap();
        assert_eq!(sql, "a = ? AND b = ?");
        assert_eq!(values, vec![Value::Int(18), Value::String("x".into())]);
    }

    #[test]
    fn compile_postgres_numbers_in_textual_order() {
        let mut args = Args::new(Dialect::PostgreSQL);
        let t0 = args.var(1);
        let t1 = args.var(2);
        // tokens swapped relative to registration order
        let (sql, values) = args.compile(&format!("x = {} AND y = {}", t1, t0)).unwrap();
        assert_eq!(sql, "x = $1 AND y = $2");
        assert_eq!(values, vec![Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn raw_is_spliced_not_bound() {
        let mut args = Args::new(Dialect::MySQL);
        let t = args.var(raw("UNIX_TIMESTAMP(NOW())"));
        let (sql, values) = args.compile(&format!("created = {}", t)).unwrap();
        assert_eq!(sql, "created = UNIX_TIMESTAMP(NOW())");
        assert!(values.is_empty());
    }

    #[test]
    fn escaped_dollar_passes_through_once() {
        let mut args = Args::new(Dialect::MySQL);
        let t = args.var(1);
        let (sql, values) = args.compile(&format!("$$price = {}", t)).unwrap();
        assert_eq!(sql, "$price = ?");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn unknown_tokens_copied_literally() {
        let args = Args::new(Dialect::MySQL);
        let (sql, values) = args.compile("a = $9 OR b = ${missing}").unwrap();
        assert_eq!(sql, "a = $9 OR b = ${missing}");
        assert!(values.is_empty());
    }

    #[test]
    fn named_unwraps_outside_mssql() {
        let mut args = Args::new(Dialect::PostgreSQL);
        let t = args.var(named("age", 18));
        let (sql, values) = args.compile(&format!("age >= {}", t)).unwrap();
        assert_eq!(sql, "age >= $1");
        assert_eq!(values, vec![Value::Int(18)]);
    }

    #[test]
    fn named_preserved_for_mssql() {
        let mut args = Args::new(Dialect::MsSQL);
        let t = args.var(named("age", 18));
        let (sql, values) = args.compile(&format!("age >= {}", t)).unwrap();
        assert_eq!(sql, "age >= @age");
        match &values[0] {
            Value::Named { name, value } => {
                assert_eq!(name, "age");
                assert_eq!(**value, Value::Int(18));
            }
            other => panic!("expected named value, got {:?}", other),
        }
    }

    #[test]
    fn named_only_rejects_positional_at_compile() {
        let mut args = Args::new_named(Dialect::MySQL);
        let t = args.var(7);
        let err = args.compile(&format!("a = {}", t)).unwrap_err();
        assert!(matches!(err, DbError::DataInvalid(_)));
    }

    #[test]
    fn compile_string_inlines_literals() {
        let mut args = Args::new(Dialect::MySQL);
        let t0 = args.var("o'neil");
        let t1 = args.var(3);
        let sql = args.compile_string(&format!("name = {} AND n = {}", t0, t1));
        assert_eq!(sql, "name = 'o''neil' AND n = 3");
    }
}
