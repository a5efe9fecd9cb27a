//! Typed entry points: compose a builder, build, route through the engine.

use crate::engine::DB;
use crate::scanner;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlrelay_builder::{ArgValue, Builder, DeleteBuilder, SelectBuilder, UpdateBuilder};
use sqlrelay_core::{DbError, Dialect, ExecResult, Maps, QueryResult, Result, Value};
use std::collections::HashMap;

/// Pagination summary returned by [`DB::pages`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    /// Total rows matching the WHERE clause
    pub total: u64,
    /// Total pages (`ceil(total / pagesize)`)
    pub count: u64,
    /// The requested page
    pub curpage: u64,
}

/// Batch insert tuning
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Rows per INSERT statement
    pub max_batch: usize,
    /// Reconstruct ids arithmetically from one multi-row insert. When off,
    /// rows are inserted one statement at a time for exact ids (PostgreSQL
    /// always reads them from RETURNING instead).
    pub infer_ids: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch: 1000,
            infer_ids: false,
        }
    }
}

fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Uint(u)
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        nested => Value::Json(nested),
    }
}

/// Split serialized input data into a column list and value rows. Accepts
/// one object or an array of objects sharing the first object's columns.
fn parse_data<T: Serialize>(data: &T) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let json = serde_json::to_value(data).map_err(|e| DbError::DataInvalid(e.to_string()))?;
    match json {
        serde_json::Value::Object(map) => {
            let mut cols = Vec::with_capacity(map.len());
            let mut row = Vec::with_capacity(map.len());
            for (k, v) in map {
                cols.push(k);
                row.push(json_to_value(v));
            }
            Ok((cols, vec![row]))
        }
        serde_json::Value::Array(items) => {
            let mut cols: Vec<String> = Vec::new();
            let mut rows = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let serde_json::Value::Object(mut map) = item else {
                    return Err(DbError::DataInvalid(format!(
                        "row {} is not an object",
                        i
                    )));
                };
                if i == 0 {
                    cols = map.keys().cloned().collect();
                }
                let mut row = Vec::with_capacity(cols.len());
                for col in &cols {
                    let v = map.remove(col).ok_or_else(|| {
                        DbError::DataInvalid(format!("row {} is missing column {}", i, col))
                    })?;
                    row.push(json_to_value(v));
                }
                rows.push(row);
            }
            Ok((cols, rows))
        }
        _ => Err(DbError::DataInvalid(
            "insert data must be an object or an array of objects".to_string(),
        )),
    }
}

/// Column list and rows from map-form input
fn parse_maps(rows_in: &Maps) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let first = rows_in
        .first()
        .ok_or(DbError::InsertEmpty)?;
    let mut cols: Vec<String> = first.keys().cloned().collect();
    cols.sort();

    let mut rows = Vec::with_capacity(rows_in.len());
    for (i, map) in rows_in.iter().enumerate() {
        let mut row = Vec::with_capacity(cols.len());
        for col in &cols {
            let v = map.get(col).ok_or_else(|| {
                DbError::DataInvalid(format!("row {} is missing column {}", i, col))
            })?;
            row.push(v.clone());
        }
        rows.push(row);
    }
    Ok((cols, rows))
}

impl DB {
    /// Build and run a statement that modifies data
    pub async fn exec_builder(&self, builder: &dyn Builder) -> Result<ExecResult> {
        let (sql, args) = builder.build()?;
        self.exec(&sql, &args).await
    }

    /// Build and run a query
    pub async fn query_builder(&self, builder: &dyn Builder) -> Result<QueryResult> {
        let (sql, args) = builder.build()?;
        self.query(&sql, &args).await
    }

    /// Run a query and scan into the list-of-map form
    pub async fn query_to_maps(&self, sql: &str, args: &[Value]) -> Result<Maps> {
        let result = self.query(sql, args).await?;
        Ok(scanner::scan_maps(&result))
    }

    /// Run a query and scan into typed records
    pub async fn query_to<T: DeserializeOwned>(&self, sql: &str, args: &[Value]) -> Result<Vec<T>> {
        let result = self.query(sql, args).await?;
        scanner::scan(&result)
    }

    /// Insert one row (or several, given an array) and return the last
    /// insert id. On PostgreSQL the id is read back via RETURNING.
    pub async fn insert<T: Serialize>(&self, table: &str, data: &T) -> Result<i64> {
        let (cols, rows) = parse_data(data)?;
        self.insert_rows(table, &cols, rows, "INSERT", &[]).await
    }

    /// [`DB::insert`] with post-clause options appended to the statement
    /// (e.g. `ON DUPLICATE KEY UPDATE …`)
    pub async fn insert_with_options<T: Serialize>(
        &self,
        table: &str,
        data: &T,
        options: &[&str],
    ) -> Result<i64> {
        let (cols, rows) = parse_data(data)?;
        self.insert_rows(table, &cols, rows, "INSERT", options).await
    }

    /// Insert from map-form rows
    pub async fn insert_maps(&self, table: &str, rows: Maps) -> Result<i64> {
        let (cols, rows) = parse_maps(&rows)?;
        self.insert_rows(table, &cols, rows, "INSERT", &[]).await
    }

    /// REPLACE one row (or several); MySQL-family engines only
    pub async fn replace<T: Serialize>(&self, table: &str, data: &T) -> Result<i64> {
        let (cols, rows) = parse_data(data)?;
        self.insert_rows(table, &cols, rows, "REPLACE", &[]).await
    }

    async fn insert_rows(
        &self,
        table: &str,
        cols: &[String],
        rows: Vec<Vec<Value>>,
        verb: &str,
        options: &[&str],
    ) -> Result<i64> {
        if cols.is_empty() || rows.is_empty() {
            return Err(DbError::InsertEmpty);
        }

        let mut b = match verb {
            "REPLACE" => sqlrelay_builder::replace(table),
            _ => sqlrelay_builder::insert(table),
        };
        b.set_dialect(self.dialect());
        b.cols(cols);
        for row in rows {
            b.values(row.into_iter().map(ArgValue::from));
        }
        for opt in options {
            b.option([*opt]);
        }

        let (mut sql, args) = b.build()?;

        if self.dialect().supports_insert_returning() {
            sql.push_str(&format!(" RETURNING {}", self.dialect().quote(self.id_key())));
            let result = self.query_primary(&sql, &args).await?;
            return result
                .rows
                .last()
                .and_then(|row| row.get(0))
                .and_then(|v| v.as_i64())
                .ok_or_else(|| DbError::Exception("insert returned no id".to_string()));
        }

        let result = self.exec(&sql, &args).await?;
        if result.rows_affected == 0 {
            return Err(DbError::InsertEmpty);
        }
        Ok(result.last_insert_id)
    }

    /// Insert many rows in chunks inside one transaction and return the
    /// generated id of every row.
    ///
    /// Id reconstruction from a single multi-row insert follows the
    /// engine's reporting convention: MySQL reports the first allocated id
    /// (ids ascend from it); the other engines report the last (ids are
    /// counted back from it, which assumes no concurrent writer slipped
    /// in). Strict mode inserts row by row and is the only mode with
    /// guaranteed-exact ids.
    pub async fn batch_insert<T: Serialize>(
        &self,
        table: &str,
        data: &T,
        config: BatchConfig,
    ) -> Result<Vec<i64>> {
        let (cols, rows) = parse_data(data)?;
        if cols.is_empty() || rows.is_empty() {
            return Err(DbError::InsertEmpty);
        }

        let table = table.to_string();
        self.transaction(move |db| {
            Box::pin(async move { batch_insert_chunks(db, &table, &cols, rows, &config).await })
        })
        .await
    }

    /// Run a customized SELECT and scan to the list-of-map form
    pub async fn find_all<F>(&self, table: &str, f: F) -> Result<Maps>
    where
        F: FnOnce(&mut SelectBuilder) -> Result<()>,
    {
        let result = self.find_query(table, f).await?;
        Ok(scanner::scan_maps(&result))
    }

    /// Run a customized SELECT limited to one row; empty is `not_found`
    pub async fn find_one<F>(&self, table: &str, f: F) -> Result<HashMap<String, Value>>
    where
        F: FnOnce(&mut SelectBuilder) -> Result<()>,
    {
        let result = self
            .find_query(table, |b| {
                b.limit(1);
                f(b)
            })
            .await?;
        scanner::scan_maps(&result)
            .into_iter()
            .next()
            .ok_or(DbError::NotFound)
    }

    /// Run a customized SELECT and scan into typed records
    pub async fn find_as<T, F>(&self, table: &str, f: F) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: FnOnce(&mut SelectBuilder) -> Result<()>,
    {
        let result = self.find_query(table, f).await?;
        scanner::scan(&result)
    }

    /// Run a customized SELECT limited to one typed record
    pub async fn find_one_as<T, F>(&self, table: &str, f: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(&mut SelectBuilder) -> Result<()>,
    {
        let result = self
            .find_query(table, |b| {
                b.limit(1);
                f(b)
            })
            .await?;
        scanner::scan_one(&result)
    }

    async fn find_query<F>(&self, table: &str, f: F) -> Result<QueryResult>
    where
        F: FnOnce(&mut SelectBuilder) -> Result<()>,
    {
        let mut b = sqlrelay_builder::query(table);
        b.set_dialect(self.dialect());
        f(&mut b)?;
        let (sql, args) = b.build()?;
        self.query(&sql, &args).await
    }

    /// Page through a customized SELECT. The total is recomputed with a
    /// `count(*)` projection, cleared LIMIT/OFFSET, and no ORDER BY.
    pub async fn pages<F>(
        &self,
        table: &str,
        page: u64,
        pagesize: u64,
        f: F,
    ) -> Result<(Maps, PageInfo)>
    where
        F: Fn(&mut SelectBuilder) -> Result<()>,
    {
        if pagesize == 0 {
            return Err(DbError::DataInvalid("pagesize must be positive".to_string()));
        }

        let mut b = sqlrelay_builder::query(table);
        b.set_dialect(self.dialect());
        b.limit(pagesize as i64);
        if page > 0 {
            b.offset(((page - 1) * pagesize) as i64);
        }
        f(&mut b)?;
        let (sql, args) = b.build()?;
        let list = scanner::scan_maps(&self.query(&sql, &args).await?);

        let mut cb = sqlrelay_builder::query(table);
        cb.set_dialect(self.dialect());
        f(&mut cb)?;
        cb.set_select(["count(*) AS total"]);
        cb.limit(-1).offset(-1).order_by(Vec::<String>::new());
        let (sql, args) = cb.build()?;
        let result = self.query(&sql, &args).await?;
        let total = result
            .rows
            .first()
            .and_then(|row| row.get_by_name("total"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Ok((
            list,
            PageInfo {
                total,
                count: total.div_ceil(pagesize),
                curpage: page,
            },
        ))
    }

    /// Update rows from serialized column data; the closure supplies the
    /// WHERE clause (and anything else). Missing WHERE fails at build time.
    pub async fn update<T, F>(&self, table: &str, data: &T, f: F) -> Result<u64>
    where
        T: Serialize,
        F: FnOnce(&mut UpdateBuilder) -> Result<()>,
    {
        let (cols, rows) = parse_data(data)?;
        if rows.len() != 1 {
            return Err(DbError::DataInvalid(
                "update expects a single row of column data".to_string(),
            ));
        }
        let mut b = sqlrelay_builder::update(table);
        b.set_dialect(self.dialect());
        b.limit_by(self.id_key());
        let row = rows.into_iter().next().unwrap_or_default();
        for (col, value) in cols.iter().zip(row) {
            let assignment = b.assign(col, value);
            b.set_more(assignment);
        }
        f(&mut b)?;
        let result = self.exec_builder(&b).await?;
        Ok(result.rows_affected)
    }

    /// Update rows from one map of column values
    pub async fn update_maps<F>(
        &self,
        table: &str,
        data: HashMap<String, Value>,
        f: F,
    ) -> Result<u64>
    where
        F: FnOnce(&mut UpdateBuilder) -> Result<()>,
    {
        let (cols, rows) = parse_maps(&vec![data])?;
        let mut b = sqlrelay_builder::update(table);
        b.set_dialect(self.dialect());
        b.limit_by(self.id_key());
        let row = rows.into_iter().next().unwrap_or_default();
        for (col, value) in cols.iter().zip(row) {
            let assignment = b.assign(col, value);
            b.set_more(assignment);
        }
        f(&mut b)?;
        let result = self.exec_builder(&b).await?;
        Ok(result.rows_affected)
    }

    /// Delete rows; the closure supplies the WHERE clause. Missing WHERE
    /// fails at build time.
    pub async fn delete<F>(&self, table: &str, f: F) -> Result<u64>
    where
        F: FnOnce(&mut DeleteBuilder) -> Result<()>,
    {
        let mut b = sqlrelay_builder::delete(table);
        b.set_dialect(self.dialect());
        b.limit_by(self.id_key());
        f(&mut b)?;
        let result = self.exec_builder(&b).await?;
        Ok(result.rows_affected)
    }
}

async fn batch_insert_chunks(
    db: &DB,
    table: &str,
    cols: &[String],
    rows: Vec<Vec<Value>>,
    config: &BatchConfig,
) -> Result<Vec<i64>> {
    let dialect = db.dialect();
    let chunk_size = config.max_batch.max(1);
    let mut ids = Vec::with_capacity(rows.len());

    for chunk in rows.chunks(chunk_size) {
        if dialect.supports_insert_returning() {
            let mut b = sqlrelay_builder::insert(table);
            b.set_dialect(dialect);
            b.cols(cols);
            for row in chunk {
                b.values(row.iter().cloned().map(ArgValue::from));
            }
            let (mut sql, args) = b.build()?;
            sql.push_str(&format!(" RETURNING {}", dialect.quote(db.id_key())));
            let result = db.query_primary(&sql, &args).await?;
            for row in &result.rows {
                if let Some(id) = row.get(0).and_then(|v| v.as_i64()) {
                    ids.push(id);
                }
            }
        } else if config.infer_ids || chunk.len() == 1 {
            let mut b = sqlrelay_builder::insert(table);
            b.set_dialect(dialect);
            b.cols(cols);
            for row in chunk {
                b.values(row.iter().cloned().map(ArgValue::from));
            }
            let result = db.exec_builder(&b).await?;
            let n = chunk.len() as i64;
            let last = result.last_insert_id;
            match dialect {
                // MySQL reports the first id of a multi-row insert
                Dialect::MySQL | Dialect::Doris => ids.extend(last..last + n),
                // the rest report the last allocated id
                _ => ids.extend((last - (n - 1))..=last),
            }
        } else {
            for row in chunk {
                let mut b = sqlrelay_builder::insert(table);
                b.set_dialect(dialect);
                b.cols(cols);
                b.values(row.iter().cloned().map(ArgValue::from));
                let result = db.exec_builder(&b).await?;
                ids.push(result.last_insert_id);
            }
        }
    }

    Ok(ids)
}
