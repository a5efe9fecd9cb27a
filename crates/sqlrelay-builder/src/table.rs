//! Table-level builders: existence probe, DROP, CREATE TABLE

use crate::Builder;
use crate::args::escape;
use crate::cond::Cond;
use sqlrelay_core::{CatalogQuery, Dialect, Field, Result, Value};

/// Entry point for table-level statements
pub struct TableBuilder {
    table: String,
    cond: Cond,
}

impl TableBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: escape(&table.into()),
            cond: Cond::new(Dialect::default()),
        }
    }

    pub fn set_dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.cond.set_dialect(dialect);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.cond.dialect()
    }

    /// DROP TABLE statement
    pub fn drop_table(&self) -> String {
        format!("DROP TABLE {}", self.cond.dialect().quote(&self.table))
    }

    /// Catalog probe for this table's existence
    pub fn has(&self, database: &str) -> CatalogQuery<bool> {
        self.cond.dialect().has_table(database, &self.table)
    }

    /// CREATE TABLE builder for this table
    pub fn create(self) -> CreateTableBuilder {
        CreateTableBuilder {
            table: self.table,
            cond: self.cond,
            verb: "CREATE TABLE",
            if_not_exists: false,
            defines: Vec::new(),
            options: Vec::new(),
            columns: Vec::new(),
        }
    }
}

/// A builder to build CREATE TABLE
pub struct CreateTableBuilder {
    pub cond: Cond,
    table: String,
    verb: &'static str,
    if_not_exists: bool,
    defines: Vec<Vec<String>>,
    options: Vec<Vec<String>>,
    columns: Vec<Field>,
}

impl CreateTableBuilder {
    /// Change to CREATE TEMPORARY TABLE
    pub fn temp_table(mut self) -> Self {
        self.verb = "CREATE TEMPORARY TABLE";
        self
    }

    pub fn set_dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.cond.set_dialect(dialect);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.cond.dialect()
    }

    /// Add IF NOT EXISTS before the table name
    pub fn if_not_exists(&mut self) -> &mut Self {
        self.if_not_exists = true;
        self
    }

    /// Add a free-form definition line (column or index)
    pub fn define<I, S>(&mut self, def: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defines.push(def.into_iter().map(Into::into).collect());
        self
    }

    /// Add a table option
    pub fn option<I, S>(&mut self, opt: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.push(opt.into_iter().map(Into::into).collect());
        self
    }

    /// Add typed column definitions
    pub fn column<I>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = Field>,
    {
        self.columns.extend(fields);
        self
    }

    fn draft(&self, dialect: Dialect) -> String {
        let mut buf = String::with_capacity(256);

        buf.push_str(self.verb);
        if self.if_not_exists {
            buf.push_str(" IF NOT EXISTS");
        }
        buf.push(' ');
        buf.push_str(&dialect.quote(&self.table));

        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|f| format!("{} {}", dialect.quote(&f.name), dialect.data_type_of(f, false)))
            .collect();
        defs.extend(self.defines.iter().map(|d| d.join(" ")));

        if !defs.is_empty() {
            buf.push_str(" (");
            buf.push_str(&defs.join(", "));
            buf.push(')');
        }

        if !self.options.is_empty() {
            buf.push(' ');
            let opts: Vec<String> = self.options.iter().map(|o| o.join(" ")).collect();
            buf.push_str(&opts.join(" "));
        }

        if dialect == Dialect::Doris {
            return self.doris_rewrite(buf);
        }

        buf
    }

    /// Doris DDL bridge: translate double-quoted identifiers to backticks
    /// and inject default engine/distribution options when the statement
    /// carries none.
    fn doris_rewrite(&self, sql: String) -> String {
        let mut sql = sql.replace('"', "`");

        if !self.options.is_empty() || sql.to_uppercase().contains("ENGINE=") {
            return sql;
        }

        let dist_col = self
            .columns
            .iter()
            .find(|f| f.primary_key)
            .map(|f| f.name.as_str())
            .unwrap_or("id");

        sql.push_str(&format!(
            " ENGINE=OLAP DUPLICATE KEY(`{col}`) DISTRIBUTED BY HASH(`{col}`) BUCKETS 10 PROPERTIES (\"replication_num\" = \"1\")",
            col = dist_col
        ));
        sql
    }
}

impl Builder for CreateTableBuilder {
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
    use sqlrelay_core::DataType;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_table_mysql() {
        let mut tb = TableBuilder::new("user").create();
        tb.set_dialect(Dialect::MySQL);
        tb.if_not_exists();
        tb.column([
            Field::new("id", DataType::Int64).primary_key().auto_increment(),
            Field::new("username", DataType::String).size(100),
            Field::new("age", DataType::Int32),
        ]);
        tb.option(["ENGINE=InnoDB"]);

        let (sql, values) = tb.build().unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `user` (`id` bigint AUTO_INCREMENT PRIMARY KEY, `username` varchar(100) NOT NULL, `age` int NOT NULL) ENGINE=InnoDB"
        );
        assert!(values.is_empty());
    }

    #[test]
    fn create_temp_table() {
        let mut tb = TableBuilder::new("t").create().temp_table();
        tb.set_dialect(Dialect::SQLite);
        tb.define(["id", "integer", "PRIMARY KEY"]);
        let (sql, _) = tb.build().unwrap();
        assert_eq!(sql, "CREATE TEMPORARY TABLE \"t\" (id integer PRIMARY KEY)");
    }

    #[test]
    fn mixed_columns_and_defines() {
        let mut tb = TableBuilder::new("t").create();
        tb.set_dialect(Dialect::PostgreSQL);
        tb.column([Field::new("id", DataType::Int32).primary_key().auto_increment()]);
        tb.define(["UNIQUE", "(id)"]);
        let (sql, _) = tb.build().unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"t\" (\"id\" serial PRIMARY KEY, UNIQUE (id))"
        );
    }

    #[test]
    fn doris_injects_default_options() {
        let mut tb = TableBuilder::new("events").create();
        tb.set_dialect(Dialect::Doris);
        tb.column([
            Field::new("id", DataType::Int64).primary_key(),
            Field::new("payload", DataType::Text),
        ]);

        let (sql, _) = tb.build().unwrap();
        assert!(sql.starts_with("CREATE TABLE `events` (`id` BIGINT NOT NULL"));
        assert!(sql.contains("ENGINE=OLAP"));
        assert!(sql.contains("DISTRIBUTED BY HASH(`id`) BUCKETS 10"));
        assert!(sql.contains("\"replication_num\" = \"1\""));
    }

    #[test]
    fn doris_keeps_explicit_options() {
        let mut tb = TableBuilder::new("events").create();
        tb.set_dialect(Dialect::Doris);
        tb.column([Field::new("id", DataType::Int64)]);
        tb.option(["ENGINE=OLAP", "DISTRIBUTED BY HASH(id) BUCKETS 4"]);

        let (sql, _) = tb.build().unwrap();
        assert_eq!(sql.matches("ENGINE=OLAP").count(), 1);
        assert!(sql.contains("BUCKETS 4"));
    }

    #[test]
    fn drop_and_has() {
        let mut tb = TableBuilder::new("user");
        tb.set_dialect(Dialect::MySQL);
        assert_eq!(tb.drop_table(), "DROP TABLE `user`");
        let q = tb.has("app");
        assert!(q.sql.contains("information_schema.tables"));
    }
}
