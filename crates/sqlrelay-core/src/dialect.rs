//! SQL dialect registry
//!
//! A [`Dialect`] identifies one engine variant and carries its identifier
//! quoting rules, placeholder style, declarative type mapping, and catalog
//! query templates. Dialects are deterministic and perform no I/O.

use crate::field::{DataType, Field};
use crate::types::{Maps, Value};

/// Supported SQL engine variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySQL,
    PostgreSQL,
    SQLite,
    MsSQL,
    ClickHouse,
    Doris,
}

/// A catalog query: the SQL to run, its arguments, and a projection applied
/// to the scanned result rows.
pub struct CatalogQuery<T> {
    pub sql: String,
    pub args: Vec<Value>,
    pub project: Box<dyn Fn(&Maps) -> T + Send + Sync>,
}

fn count_above_zero(rows: &Maps) -> bool {
    rows.first()
        .and_then(|row| row.get("count"))
        .and_then(|v| v.as_i64())
        .map(|n| n > 0)
        .unwrap_or(false)
}

impl Default for Dialect {
    /// The default dialect for builders constructed outside an engine
    fn default() -> Self {
        Dialect::SQLite
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Dialect {
    /// Name of the dialect
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySQL => "MySQL",
            Dialect::PostgreSQL => "PostgreSQL",
            Dialect::SQLite => "SQLite",
            Dialect::MsSQL => "MsSQL",
            Dialect::ClickHouse => "ClickHouse",
            Dialect::Doris => "Doris",
        }
    }

    /// Identifier quote character
    pub fn quote_char(&self) -> char {
        match self {
            Dialect::MySQL | Dialect::Doris => '`',
            _ => '"',
        }
    }

    /// Concrete placeholder for the 1-based parameter position `n`
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::PostgreSQL => format!("${}", n),
            Dialect::MsSQL => format!("@p{}", n),
            _ => "?".to_string(),
        }
    }

    /// Whether INSERT can report generated ids through a RETURNING clause
    pub fn supports_insert_returning(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    /// Whether UPDATE/DELETE accept a native LIMIT clause
    pub fn supports_update_limit(&self) -> bool {
        matches!(self, Dialect::MySQL | Dialect::Doris)
    }

    /// Whether UNION sub-selects are parenthesized
    pub fn union_parentheses(&self) -> bool {
        !matches!(self, Dialect::SQLite)
    }

    /// Quote an identifier so it can be used safely.
    ///
    /// Dot-separated segments are quoted individually; `*`, parenthesized
    /// expressions, already-quoted segments, and anything after the first
    /// space (alias or keyword) pass through untouched.
    pub fn quote(&self, name: &str) -> String {
        if name.is_empty() || name == "*" || name.contains('(') {
            return name.to_string();
        }
        if let Some(pos) = name.find(' ') {
            let (head, rest) = name.split_at(pos);
            return format!("{}{}", self.quote(head), rest);
        }

        let q = self.quote_char();
        let segments: Vec<String> = name
            .split('.')
            .map(|seg| {
                if seg == "*" {
                    seg.to_string()
                } else if seg.len() >= 2 && seg.starts_with(q) && seg.ends_with(q) {
                    seg.to_string()
                } else {
                    format!("{q}{seg}{q}")
                }
            })
            .collect();
        segments.join(".")
    }

    /// Quote a list of identifiers
    pub fn quote_cols<I, S>(&self, cols: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        cols.into_iter().map(|c| self.quote(c.as_ref())).collect()
    }

    /// Map a declarative [`Field`] to this dialect's SQL type text.
    ///
    /// With `bare` set the suffix decorations (NOT NULL, auto-increment,
    /// PRIMARY KEY, COMMENT, the ClickHouse `Nullable` wrapper) are
    /// suppressed; otherwise they are appended in that fixed order.
    pub fn data_type_of(&self, f: &Field, bare: bool) -> String {
        if let Some(raw) = &f.raw_data_type {
            return raw.clone();
        }
        match self {
            Dialect::MySQL => mysql_type(f, bare),
            Dialect::PostgreSQL => postgres_type(f, bare),
            Dialect::SQLite => sqlite_type(f, bare),
            Dialect::MsSQL => mssql_type(f, bare),
            Dialect::ClickHouse => clickhouse_type(f, bare),
            Dialect::Doris => doris_type(f, bare),
        }
    }

    /// Probe for the engine version
    pub fn version_query(&self) -> &'static str {
        match self {
            Dialect::SQLite => "SELECT SQLITE_VERSION()",
            Dialect::MsSQL => "SELECT @@VERSION",
            Dialect::ClickHouse => "SELECT version()",
            _ => "SELECT VERSION()",
        }
    }

    /// Catalog probe for table existence. `database` is the schema/catalog
    /// the engine is connected to (ignored by SQLite).
    pub fn has_table(&self, database: &str, table: &str) -> CatalogQuery<bool> {
        let (sql, args) = match self {
            Dialect::SQLite => (
                "SELECT count(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?"
                    .to_string(),
                vec![Value::from(table)],
            ),
            Dialect::MySQL => (
                "SELECT count(*) AS count FROM information_schema.tables WHERE table_schema = ? AND table_name = ? AND table_type = ?"
                    .to_string(),
                vec![
                    Value::from(database),
                    Value::from(table),
                    Value::from("BASE TABLE"),
                ],
            ),
            Dialect::PostgreSQL => (
                "SELECT count(*) AS count FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2 AND table_type = $3 AND table_catalog = $4"
                    .to_string(),
                vec![
                    Value::from("public"),
                    Value::from(table),
                    Value::from("BASE TABLE"),
                    Value::from(database),
                ],
            ),
            Dialect::MsSQL => (
                "SELECT count(*) AS count FROM INFORMATION_SCHEMA.tables WHERE table_name = ? AND table_catalog = ?"
                    .to_string(),
                vec![Value::from(table), Value::from(database)],
            ),
            Dialect::ClickHouse => (
                "SELECT count(*) AS count FROM system.tables WHERE database = ? AND name = ?"
                    .to_string(),
                vec![Value::from(database), Value::from(table)],
            ),
            Dialect::Doris => (
                "SELECT count(*) AS count FROM information_schema.tables WHERE table_schema = ? AND table_name = ?"
                    .to_string(),
                vec![Value::from(database), Value::from(table)],
            ),
        };
        CatalogQuery {
            sql,
            args,
            project: Box::new(count_above_zero),
        }
    }

    /// Catalog probe for column names and types, projected to a
    /// name → type map.
    pub fn get_column(
        &self,
        database: &str,
        table: &str,
    ) -> CatalogQuery<std::collections::HashMap<String, String>> {
        let (sql, args, name_key, type_key) = match self {
            Dialect::SQLite => (
                format!("PRAGMA table_info('{}')", table),
                vec![],
                "name",
                "type",
            ),
            Dialect::MySQL | Dialect::Doris => (
                "SELECT column_name, column_default, is_nullable = 'YES', data_type, character_maximum_length, column_type, column_key, extra, column_comment, numeric_precision, numeric_scale FROM information_schema.columns WHERE table_schema = ? AND table_name = ? ORDER BY ORDINAL_POSITION"
                    .to_string(),
                vec![Value::from(database), Value::from(table)],
                "column_name",
                "column_type",
            ),
            Dialect::PostgreSQL => (
                "SELECT column_name, data_type, is_nullable FROM information_schema.columns WHERE table_catalog = $1 AND table_name = $2 ORDER BY ordinal_position"
                    .to_string(),
                vec![Value::from(database), Value::from(table)],
                "column_name",
                "data_type",
            ),
            Dialect::MsSQL => (
                "SELECT COLUMN_NAME AS column_name, DATA_TYPE AS data_type FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = ? AND TABLE_CATALOG = ?"
                    .to_string(),
                vec![Value::from(table), Value::from(database)],
                "column_name",
                "data_type",
            ),
            Dialect::ClickHouse => (
                "SELECT name, type, default_expression, is_in_primary_key FROM system.columns WHERE database = ? AND table = ?"
                    .to_string(),
                vec![Value::from(database), Value::from(table)],
                "name",
                "type",
            ),
        };
        CatalogQuery {
            sql,
            args,
            project: Box::new(move |rows: &Maps| {
                let mut columns = std::collections::HashMap::with_capacity(rows.len());
                for row in rows {
                    let name = row.get(name_key).and_then(|v| v.as_str()).unwrap_or("");
                    if name.is_empty() {
                        continue;
                    }
                    let ty = row
                        .get(type_key)
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    columns.insert(name.to_string(), ty);
                }
                columns
            }),
        }
    }

    /// Catalog probe for index existence
    pub fn has_index(&self, database: &str, table: &str, name: &str) -> CatalogQuery<bool> {
        match self {
            Dialect::MySQL => {
                let wanted = name.to_string();
                CatalogQuery {
                    sql: "SELECT TABLE_NAME, COLUMN_NAME, INDEX_NAME, NON_UNIQUE FROM information_schema.STATISTICS WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY INDEX_NAME, SEQ_IN_INDEX"
                        .to_string(),
                    args: vec![Value::from(database), Value::from(table)],
                    project: Box::new(move |rows: &Maps| {
                        rows.iter().any(|row| {
                            row.get("INDEX_NAME").and_then(|v| v.as_str()) == Some(&wanted)
                        })
                    }),
                }
            }
            Dialect::Doris => {
                let wanted = name.to_string();
                CatalogQuery {
                    sql: format!("SHOW INDEX FROM `{}`", table),
                    args: vec![],
                    project: Box::new(move |rows: &Maps| {
                        rows.iter().any(|row| {
                            row.get("Key_name").and_then(|v| v.as_str()) == Some(&wanted)
                        })
                    }),
                }
            }
            Dialect::SQLite => {
                let wanted = name.to_string();
                CatalogQuery {
                    sql: format!("PRAGMA index_list('{}')", table),
                    args: vec![],
                    project: Box::new(move |rows: &Maps| {
                        rows.iter()
                            .any(|row| row.get("name").and_then(|v| v.as_str()) == Some(&wanted))
                    }),
                }
            }
            Dialect::PostgreSQL => CatalogQuery {
                sql: "SELECT count(*) AS count FROM pg_indexes WHERE tablename = $1 AND indexname = $2"
                    .to_string(),
                args: vec![Value::from(table), Value::from(name)],
                project: Box::new(count_above_zero),
            },
            Dialect::MsSQL => CatalogQuery {
                sql: "SELECT count(*) AS count FROM sys.indexes WHERE name = ? AND object_id = OBJECT_ID(?)"
                    .to_string(),
                args: vec![Value::from(name), Value::from(table)],
                project: Box::new(count_above_zero),
            },
            Dialect::ClickHouse => CatalogQuery {
                sql: "SELECT count(*) AS count FROM system.data_skipping_indices WHERE database = ? AND table = ? AND name = ?"
                    .to_string(),
                args: vec![
                    Value::from(database),
                    Value::from(table),
                    Value::from(name),
                ],
                project: Box::new(count_above_zero),
            },
        }
    }

    /// Column rename statement
    pub fn rename_column(&self, table: &str, old: &str, new: &str) -> (String, Vec<Value>) {
        match self {
            Dialect::MsSQL => (
                format!("EXEC sp_rename '{}.{}', '{}', 'COLUMN'", table, old, new),
                vec![],
            ),
            _ => (
                format!(
                    "ALTER TABLE {} RENAME COLUMN {} TO {}",
                    self.quote(table),
                    self.quote(old),
                    self.quote(new)
                ),
                vec![],
            ),
        }
    }

    /// Index rename statement; not every engine supports it
    pub fn rename_index(
        &self,
        table: &str,
        old: &str,
        new: &str,
    ) -> crate::Result<(String, Vec<Value>)> {
        match self {
            Dialect::MySQL | Dialect::Doris => Ok((
                format!(
                    "ALTER TABLE {} RENAME INDEX {} TO {}",
                    self.quote(table),
                    self.quote(old),
                    self.quote(new)
                ),
                vec![],
            )),
            Dialect::PostgreSQL => Ok((
                format!(
                    "ALTER INDEX {} RENAME TO {}",
                    self.quote(old),
                    self.quote(new)
                ),
                vec![],
            )),
            Dialect::MsSQL => Ok((
                format!("EXEC sp_rename '{}.{}', '{}', 'INDEX'", table, old, new),
                vec![],
            )),
            Dialect::SQLite | Dialect::ClickHouse => Err(crate::DbError::Exception(format!(
                "{} does not support renaming indexes",
                self.name()
            ))),
        }
    }

    /// Index creation statement. `index_type` is e.g. `UNIQUE` (MsSQL,
    /// SQLite, PostgreSQL, MySQL) or a skipping-index kind for ClickHouse.
    pub fn create_index(
        &self,
        table: &str,
        name: &str,
        columns: &[&str],
        index_type: &str,
    ) -> (String, Vec<Value>) {
        let cols = self.quote_cols(columns).join(", ");
        match self {
            Dialect::MySQL | Dialect::Doris => {
                let kind = if index_type.trim().is_empty() {
                    String::new()
                } else {
                    format!("{} ", index_type.trim())
                };
                (
                    format!(
                        "ALTER TABLE {} ADD {}INDEX {}({})",
                        self.quote(table),
                        kind,
                        self.quote(name),
                        cols
                    ),
                    vec![],
                )
            }
            Dialect::MsSQL => {
                let prefix = if index_type.trim().is_empty() {
                    String::new()
                } else {
                    format!("{} ", index_type.trim().to_uppercase())
                };
                (
                    format!(
                        "CREATE {}INDEX [{}] ON [{}] ({})",
                        prefix,
                        name,
                        table,
                        columns
                            .iter()
                            .map(|c| format!("[{}]", c))
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    vec![],
                )
            }
            Dialect::ClickHouse => {
                let kind = if index_type.is_empty() {
                    "minmax"
                } else {
                    index_type
                };
                (
                    format!(
                        "ALTER TABLE {} ADD INDEX {} ({}) TYPE {} GRANULARITY 1",
                        self.quote(table),
                        self.quote(name),
                        cols,
                        kind
                    ),
                    vec![],
                )
            }
            Dialect::SQLite | Dialect::PostgreSQL => {
                let prefix = if index_type.trim().is_empty() {
                    String::new()
                } else {
                    format!("{} ", index_type.trim().to_uppercase())
                };
                (
                    format!(
                        "CREATE {}INDEX {} ON {} ({})",
                        prefix,
                        self.quote(name),
                        self.quote(table),
                        cols
                    ),
                    vec![],
                )
            }
        }
    }
}

fn push_common_suffix(out: &mut String, f: &Field, auto_increment_kw: Option<&str>) {
    if f.not_null && !f.primary_key {
        out.push_str(" NOT NULL");
    }
    if f.auto_increment {
        if let Some(kw) = auto_increment_kw {
            out.push(' ');
            out.push_str(kw);
        }
    }
    if f.primary_key {
        out.push_str(" PRIMARY KEY");
    }
}

fn mysql_type(f: &Field, bare: bool) -> String {
    let mut t = match f.data_type.collapse() {
        DataType::Bool => "boolean".to_string(),
        DataType::Int | DataType::Uint | DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 | DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => {
            let size = if f.auto_increment { 4294967295 } else { f.size };
            mysql_number_type(f, size)
        }
        DataType::Float => {
            if f.precision > 0 {
                format!("decimal({}, {})", f.precision, f.scale)
            } else if f.size <= 32 {
                "float".to_string()
            } else {
                "double".to_string()
            }
        }
        DataType::String => {
            let size = if f.size == 0 { 250 } else { f.size };
            if (65536..=1 << 24).contains(&size) {
                "mediumtext".to_string()
            } else if size > 1 << 24 {
                "longtext".to_string()
            } else {
                format!("varchar({})", size)
            }
        }
        DataType::Text => "longtext".to_string(),
        DataType::Time => {
            let precision = if f.precision > 0 {
                format!("({})", f.precision)
            } else {
                String::new()
            };
            if f.required() {
                format!("datetime{}", precision)
            } else {
                format!("datetime{} NULL", precision)
            }
        }
        DataType::Bytes => {
            if f.size > 0 && f.size < 65536 {
                format!("varbinary({})", f.size)
            } else if (65536..=1 << 24).contains(&f.size) {
                "mediumblob".to_string()
            } else {
                "longblob".to_string()
            }
        }
        DataType::Json => "json".to_string(),
    };

    if !bare {
        push_common_suffix(&mut t, f, Some("AUTO_INCREMENT"));
        if !f.comment.is_empty() {
            t.push_str(&format!(" COMMENT '{}'", f.comment));
        }
    }
    t
}

fn mysql_number_type(f: &Field, size: u64) -> String {
    if size == 0 && f.primary_key {
        return "bigint UNSIGNED".to_string();
    }
    if f.data_type.collapse() == DataType::Uint {
        let base = match size {
            0 => "int",
            1..=255 => "tinyint",
            256..=65535 => "smallint",
            65536..=16777215 => "mediumint",
            16777216..=4294967295 => "int",
            _ => "bigint",
        };
        format!("{} UNSIGNED", base)
    } else {
        match size {
            0 => "int",
            1..=127 => "tinyint",
            128..=32767 => "smallint",
            32768..=8388607 => "mediumint",
            8388608..=2147483647 => "int",
            _ => "bigint",
        }
        .to_string()
    }
}

fn postgres_type(f: &Field, bare: bool) -> String {
    let mut t = match f.data_type.collapse() {
        DataType::Bool => "boolean".to_string(),
        DataType::Int | DataType::Uint | DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 | DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => {
            if f.auto_increment {
                match f.size {
                    0..=32767 => "smallserial",
                    32768..=2147483647 => "serial",
                    _ => "bigserial",
                }
                .to_string()
            } else {
                match f.size {
                    0..=32767 => "smallint",
                    32768..=2147483647 => "integer",
                    _ => "bigint",
                }
                .to_string()
            }
        }
        DataType::Float => {
            if f.precision > 0 {
                if f.scale > 0 {
                    format!("numeric({}, {})", f.precision, f.scale)
                } else {
                    format!("numeric({})", f.precision)
                }
            } else {
                "decimal".to_string()
            }
        }
        DataType::String => {
            if f.size > 0 {
                format!("varchar({})", f.size)
            } else {
                "text".to_string()
            }
        }
        DataType::Text => "text".to_string(),
        DataType::Time => {
            if f.precision > 0 {
                format!("timestamptz({})", f.precision)
            } else {
                "timestamptz".to_string()
            }
        }
        DataType::Bytes => "bytea".to_string(),
        DataType::Json => "jsonb".to_string(),
    };

    if !bare {
        // serial types already imply the sequence; no auto-increment keyword
        push_common_suffix(&mut t, f, None);
    }
    t
}

fn sqlite_type(f: &Field, bare: bool) -> String {
    let mut t = match f.data_type.collapse() {
        DataType::Bool => "numeric",
        DataType::Int | DataType::Uint | DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 | DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => "integer",
        DataType::Float => "real",
        DataType::String | DataType::Text | DataType::Json => "text",
        DataType::Time => "datetime",
        DataType::Bytes => "blob",
    }
    .to_string();

    if !bare {
        if f.not_null && !f.primary_key {
            t.push_str(" NOT NULL");
        }
        if f.primary_key {
            t.push_str(" PRIMARY KEY");
            // AUTOINCREMENT is only legal on an INTEGER PRIMARY KEY
            if f.auto_increment {
                t.push_str(" AUTOINCREMENT");
            }
        }
    }
    t
}

fn mssql_type(f: &Field, bare: bool) -> String {
    let mut t = match f.data_type.collapse() {
        DataType::Bool => "bit".to_string(),
        DataType::Int | DataType::Uint | DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 | DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => {
            let base = if f.auto_increment && f.size == 0 {
                "bigint".to_string()
            } else if f.data_type.collapse() == DataType::Uint {
                match f.size {
                    0 => "int",
                    1..=255 => "smallint",
                    256..=65535 => "int",
                    _ => "bigint",
                }
                .to_string()
            } else {
                match f.size {
                    0 => "int",
                    1..=126 => "smallint",
                    127..=32766 => "int",
                    _ => "bigint",
                }
                .to_string()
            };
            if f.auto_increment {
                format!("{} IDENTITY(1,1)", base)
            } else {
                base
            }
        }
        DataType::Float => {
            if f.precision > 0 {
                if f.scale > 0 {
                    format!("decimal({}, {})", f.precision, f.scale)
                } else {
                    format!("decimal({})", f.precision)
                }
            } else {
                "float".to_string()
            }
        }
        DataType::Text => "nvarchar(MAX)".to_string(),
        DataType::String => {
            let size = if f.size == 0 { 256 } else { f.size };
            if size <= 4000 {
                format!("nvarchar({})", size)
            } else {
                "nvarchar(MAX)".to_string()
            }
        }
        DataType::Time => {
            if f.precision > 0 {
                format!("datetimeoffset({})", f.precision)
            } else {
                "datetimeoffset".to_string()
            }
        }
        DataType::Bytes => "varbinary(MAX)".to_string(),
        DataType::Json => "nvarchar(MAX)".to_string(),
    };

    if !bare {
        // IDENTITY(1,1) is part of the base type
        push_common_suffix(&mut t, f, None);
    }
    t
}

fn clickhouse_type(f: &Field, bare: bool) -> String {
    let base = match f.data_type.collapse() {
        DataType::Bool => "UInt8".to_string(),
        DataType::Uint | DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => match f.size {
            0..=255 => "UInt8",
            256..=65535 => "UInt16",
            65536..=4294967295 => "UInt32",
            _ => "UInt64",
        }
        .to_string(),
        DataType::Int | DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => match f.size {
            0..=127 => "Int8",
            128..=32767 => "Int16",
            32768..=2147483647 => "Int32",
            _ => "Int64",
        }
        .to_string(),
        DataType::Float => {
            if f.precision > 0 {
                format!("Decimal({}, {})", f.precision, f.scale)
            } else if f.size <= 32 {
                "Float32".to_string()
            } else {
                "Float64".to_string()
            }
        }
        DataType::String => {
            if f.size > 0 {
                format!("FixedString({})", f.size)
            } else {
                "String".to_string()
            }
        }
        DataType::Text | DataType::Bytes | DataType::Json => "String".to_string(),
        DataType::Time => {
            if f.precision > 0 {
                format!("DateTime64({})", f.precision)
            } else {
                "DateTime".to_string()
            }
        }
    };

    if bare {
        return base;
    }

    let mut t = if f.required() {
        base
    } else {
        format!("Nullable({})", base)
    };
    if !f.comment.is_empty() {
        t.push_str(&format!(" COMMENT '{}'", f.comment));
    }
    t
}

fn doris_type(f: &Field, bare: bool) -> String {
    let base = match f.data_type.collapse() {
        DataType::Bool => "BOOLEAN".to_string(),
        DataType::Uint | DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => match f.size {
            0..=255 => "TINYINT UNSIGNED",
            256..=65535 => "SMALLINT UNSIGNED",
            65536..=4294967295 => "INT UNSIGNED",
            _ => "BIGINT UNSIGNED",
        }
        .to_string(),
        DataType::Int | DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => match f.size {
            0..=127 => "TINYINT",
            128..=32767 => "SMALLINT",
            32768..=2147483647 => "INT",
            _ => "BIGINT",
        }
        .to_string(),
        DataType::Float => {
            if f.precision > 0 {
                format!("DECIMAL({}, {})", f.precision, f.scale)
            } else if f.size <= 32 {
                "FLOAT".to_string()
            } else {
                "DOUBLE".to_string()
            }
        }
        DataType::String => {
            if f.size > 0 {
                format!("VARCHAR({})", f.size)
            } else {
                "STRING".to_string()
            }
        }
        DataType::Text | DataType::Bytes | DataType::Json => "STRING".to_string(),
        DataType::Time => "DATETIME".to_string(),
    };

    if bare {
        return base;
    }

    let mut t = base;
    if f.required() {
        t.push_str(" NOT NULL");
    } else {
        t.push_str(" NULL");
    }
    if !f.comment.is_empty() {
        t.push_str(&format!(" COMMENT '{}'", f.comment));
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_per_dialect() {
        assert_eq!(Dialect::MySQL.quote("user"), "`user`");
        assert_eq!(Dialect::Doris.quote("user"), "`user`");
        assert_eq!(Dialect::SQLite.quote("user"), "\"user\"");
        assert_eq!(Dialect::PostgreSQL.quote("user"), "\"user\"");
        assert_eq!(Dialect::MsSQL.quote("user"), "\"user\"");
        assert_eq!(Dialect::ClickHouse.quote("user"), "\"user\"");
    }

    #[test]
    fn quote_leaves_special_forms_alone() {
        assert_eq!(Dialect::MySQL.quote("*"), "*");
        assert_eq!(Dialect::MySQL.quote("(select 1)"), "(select 1)");
        assert_eq!(Dialect::MySQL.quote("count(*) as count"), "count(*) as count");
        assert_eq!(Dialect::MySQL.quote("u.id"), "`u`.`id`");
        assert_eq!(Dialect::MySQL.quote("u.*"), "`u`.*");
        assert_eq!(Dialect::MySQL.quote("user u"), "`user` u");
        assert_eq!(Dialect::PostgreSQL.quote("user AS u"), "\"user\" AS u");
    }

    #[test]
    fn quote_is_idempotent() {
        let once = Dialect::MySQL.quote("user");
        assert_eq!(Dialect::MySQL.quote(&once), once);
        let once = Dialect::PostgreSQL.quote("name");
        assert_eq!(Dialect::PostgreSQL.quote(&once), once);
    }

    #[test]
    fn placeholder_styles() {
        assert_eq!(Dialect::MySQL.placeholder(3), "?");
        assert_eq!(Dialect::SQLite.placeholder(1), "?");
        assert_eq!(Dialect::ClickHouse.placeholder(1), "?");
        assert_eq!(Dialect::Doris.placeholder(1), "?");
        assert_eq!(Dialect::PostgreSQL.placeholder(2), "$2");
        assert_eq!(Dialect::MsSQL.placeholder(2), "@p2");
    }

    #[test]
    fn mysql_types() {
        let f = Field::new("age", DataType::Int32);
        assert_eq!(Dialect::MySQL.data_type_of(&f, true), "int");

        let f = Field::new("id", DataType::Int64).primary_key().auto_increment();
        assert_eq!(
            Dialect::MySQL.data_type_of(&f, false),
            "bigint AUTO_INCREMENT PRIMARY KEY"
        );

        let f = Field::new("name", DataType::String);
        assert_eq!(Dialect::MySQL.data_type_of(&f, true), "varchar(250)");

        let f = Field::new("body", DataType::Bytes).size(1 << 25);
        assert_eq!(Dialect::MySQL.data_type_of(&f, true), "longblob");

        let f = Field::new("note", DataType::String).size(70000);
        assert_eq!(Dialect::MySQL.data_type_of(&f, true), "mediumtext");
    }

    #[test]
    fn postgres_serial() {
        let f = Field::new("id", DataType::Int32).auto_increment();
        assert_eq!(Dialect::PostgreSQL.data_type_of(&f, true), "serial");
        let f = Field::new("id", DataType::Int64).auto_increment();
        assert_eq!(Dialect::PostgreSQL.data_type_of(&f, true), "bigserial");
    }

    #[test]
    fn sqlite_collapses_integers() {
        let f = Field::new("n", DataType::Uint32);
        assert_eq!(Dialect::SQLite.data_type_of(&f, true), "integer");
        let f = Field::new("id", DataType::Int64).primary_key().auto_increment();
        assert_eq!(
            Dialect::SQLite.data_type_of(&f, false),
            "integer PRIMARY KEY AUTOINCREMENT"
        );
    }

    #[test]
    fn mssql_identity() {
        let f = Field::new("id", DataType::Int64).primary_key().auto_increment();
        assert_eq!(
            Dialect::MsSQL.data_type_of(&f, false),
            "bigint IDENTITY(1,1) PRIMARY KEY"
        );
    }

    #[test]
    fn clickhouse_nullable_wrap() {
        let f = Field::new("note", DataType::String).nullable();
        assert_eq!(
            Dialect::ClickHouse.data_type_of(&f, false),
            "Nullable(String)"
        );
        assert_eq!(Dialect::ClickHouse.data_type_of(&f, true), "String");
    }

    #[test]
    fn has_table_catalog_sql() {
        let q = Dialect::SQLite.has_table("main", "user");
        assert_eq!(
            q.sql,
            "SELECT count(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?"
        );
        assert_eq!(q.args, vec![Value::from("user")]);

        let q = Dialect::MySQL.has_table("app", "user");
        assert!(q.sql.contains("table_type = ?"));
        assert_eq!(q.args.len(), 3);

        let q = Dialect::PostgreSQL.has_table("app", "user");
        assert!(q.sql.contains("table_catalog = $4"));
        assert_eq!(q.args.len(), 4);

        let q = Dialect::ClickHouse.has_table("app", "user");
        assert!(q.sql.contains("system.tables"));

        let q = Dialect::Doris.has_table("app", "user");
        assert!(!q.sql.contains("table_type"));
        assert_eq!(q.args.len(), 2);
    }

    #[test]
    fn has_table_projection() {
        use std::collections::HashMap;
        let q = Dialect::SQLite.has_table("main", "user");
        let mut row = HashMap::new();
        row.insert("count".to_string(), Value::Int(1));
        assert!((q.project)(&vec![row.clone()]));
        row.insert("count".to_string(), Value::Int(0));
        assert!(!(q.project)(&vec![row]));
        assert!(!(q.project)(&vec![]));
    }

    #[test]
    fn rename_index_support() {
        assert!(Dialect::SQLite.rename_index("t", "a", "b").is_err());
        assert!(Dialect::ClickHouse.rename_index("t", "a", "b").is_err());
        let (sql, _) = Dialect::PostgreSQL.rename_index("t", "a", "b").unwrap();
        assert_eq!(sql, "ALTER INDEX \"a\" RENAME TO \"b\"");
    }
}
