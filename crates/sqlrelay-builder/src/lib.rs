//! Parameterized, dialect-aware SQL builders.
//!
//! A builder accumulates clauses and placeholder tokens, then emits the
//! final SQL and ordered argument vector in a single compile pass at
//! [`Builder::build`] time. See [`args::Args`] for the token scheme.

mod args;
mod cond;
mod delete;
mod insert;
mod select;
mod table;
mod union;
mod update;

pub use args::{ArgValue, Args, escape, escape_all, named, raw};
pub use cond::Cond;
pub use delete::DeleteBuilder;
pub use insert::InsertBuilder;
pub use select::{JoinOption, SelectBuilder};
pub use table::{CreateTableBuilder, TableBuilder};
pub use union::UnionBuilder;
pub use update::UpdateBuilder;

use sqlrelay_core::{Dialect, Result, Value};

/// A general SQL builder
pub trait Builder: Send + Sync {
    /// Compile to the final SQL string and ordered argument vector
    fn build(&self) -> Result<(String, Vec<Value>)>;

    /// Compile with an explicit dialect, appending bound values to an outer
    /// accumulator so placeholder numbering continues across a splice
    fn compile_into(&self, dialect: Dialect, values: &mut Vec<Value>) -> Result<String>;

    /// The inlined-value form, for logging only
    fn to_sql_string(&self) -> String;
}

/// SELECT builder targeting a single table
pub fn query(table: impl Into<String>) -> SelectBuilder {
    SelectBuilder::query(table)
}

/// SELECT builder with an initial column list
pub fn select<I, S>(cols: I) -> SelectBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    SelectBuilder::select(cols)
}

/// INSERT builder
pub fn insert(table: impl Into<String>) -> InsertBuilder {
    InsertBuilder::insert(table)
}

/// REPLACE builder (MySQL extension to the SQL standard)
pub fn replace(table: impl Into<String>) -> InsertBuilder {
    InsertBuilder::replace(table)
}

/// INSERT IGNORE builder
pub fn insert_ignore(table: impl Into<String>) -> InsertBuilder {
    InsertBuilder::insert_ignore(table)
}

/// UPDATE builder
pub fn update(table: impl Into<String>) -> UpdateBuilder {
    UpdateBuilder::new(table)
}

/// DELETE builder
pub fn delete(table: impl Into<String>) -> DeleteBuilder {
    DeleteBuilder::new(table)
}

/// UNION builder over the given sub-SELECTs
pub fn union(builders: Vec<SelectBuilder>) -> UnionBuilder {
    UnionBuilder::union(builders)
}

/// UNION ALL builder over the given sub-SELECTs
pub fn union_all(builders: Vec<SelectBuilder>) -> UnionBuilder {
    UnionBuilder::union_all(builders)
}

/// Table-level builder (existence probe, drop, create)
pub fn new_table(table: impl Into<String>) -> TableBuilder {
    TableBuilder::new(table)
}

/// CREATE TABLE builder
pub fn create_table(table: impl Into<String>) -> CreateTableBuilder {
    TableBuilder::new(table).create()
}

/// CREATE TEMPORARY TABLE builder
pub fn create_temp_table(table: impl Into<String>) -> CreateTableBuilder {
    TableBuilder::new(table).create().temp_table()
}

/// A builder over a free-form draft string whose tokens reference the
/// arguments in registration order (`$0`, `$1`, …)
pub struct CompiledBuilder {
    cond: Cond,
    format: String,
}

impl CompiledBuilder {
    pub fn set_dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.cond.set_dialect(dialect);
        self
    }
}

impl Builder for CompiledBuilder {
    fn build(&self) -> Result<(String, Vec<Value>)> {
        self.cond.args.compile(&self.format)
    }

    fn compile_into(&self, dialect: Dialect, values: &mut Vec<Value>) -> Result<String> {
        self.cond.args.compile_into(&self.format, dialect, values)
    }

    fn to_sql_string(&self) -> String {
        self.cond.args.compile_string(&self.format)
    }
}

/// Creates a [`CompiledBuilder`] from a draft string and positional
/// arguments
pub fn build<I, T>(format: impl Into<String>, arg: I) -> CompiledBuilder
where
    I: IntoIterator<Item = T>,
    T: Into<ArgValue>,
{
    let mut cond = Cond::new(Dialect::default());
    for a in arg {
        cond.var(a);
    }
    CompiledBuilder {
        cond,
        format: format.into(),
    }
}

/// Creates a [`CompiledBuilder`] from a draft string and named arguments
pub fn build_named<I, S, T>(format: impl Into<String>, args_in: I) -> CompiledBuilder
where
    I: IntoIterator<Item = (S, T)>,
    S: Into<String>,
    T: Into<Value>,
{
    let mut cond = Cond::new_named(Dialect::default());
    for (name, value) in args_in {
        cond.var(named(name, value));
    }
    CompiledBuilder {
        cond,
        format: format.into(),
    }
}
