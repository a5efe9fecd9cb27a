//! SQLite connection implementation

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};
use sqlrelay_core::{
    Connection, DbError, ExecResult, QueryResult, Result, Row, Transaction, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// SQLite connection wrapper.
///
/// rusqlite is synchronous; the handle lives behind a mutex and each call
/// runs inline. SQLite work is short and local, so this keeps the driver
/// simple without starving the runtime.
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
    closed: AtomicBool,
}

impl SqliteConnection {
    /// Open a SQLite database. `:memory:` and `file:` URIs are passed
    /// through; other paths are used as-is.
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                DbError::Connection(format!("failed to open in-memory database: {}", e))
            })?
        } else {
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
                DbError::Connection(format!("failed to open SQLite database at '{}': {}", path, e))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| DbError::Connection(format!("failed to enable foreign keys: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            closed: AtomicBool::new(false),
        })
    }

    fn run_query(conn: &RusqliteConnection, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DbError::Query(format!("failed to prepare query: {}", e)))?;

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let rusqlite_params = values_to_rusqlite(params);
        let mut rows = Vec::new();
        let mut query_rows = stmt
            .query(params_from_iter(rusqlite_params.iter()))
            .map_err(|e| DbError::Query(format!("failed to execute query: {}", e)))?;

        while let Some(row) = query_rows
            .next()
            .map_err(|e| DbError::Query(format!("failed to fetch row: {}", e)))?
        {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(rusqlite_to_value(row, i)?);
            }
            rows.push(Row::new(columns.clone(), values));
        }

        tracing::debug!(row_count = rows.len(), "query executed");
        Ok(QueryResult { columns, rows })
    }

    fn run_execute(conn: &RusqliteConnection, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let rusqlite_params = values_to_rusqlite(params);
        let rows_affected = conn
            .execute(sql, params_from_iter(rusqlite_params.iter()))
            .map_err(|e| DbError::Query(format!("failed to execute statement: {}", e)))?;

        tracing::debug!(affected_rows = rows_affected, "statement executed");
        Ok(ExecResult {
            last_insert_id: conn.last_insert_rowid(),
            rows_affected: rows_affected as u64,
        })
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| DbError::Connection(format!("ping failed: {}", e)))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let conn = self.conn.lock();
        Self::run_execute(&conn, sql, params)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let conn = self.conn.lock();
        Self::run_query(&conn, sql, params)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning SQLite transaction");
        {
            let conn = self.conn.lock();
            // DEFERRED takes the write lock only at the first write, the
            // behaviour expected from a default transaction
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(|e| DbError::Query(format!("failed to begin transaction: {}", e)))?;
        }
        Ok(Box::new(SqliteTransaction {
            conn: Arc::clone(&self.conn),
            finished: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// SQLite transaction wrapper.
///
/// Issues raw `BEGIN DEFERRED` / `COMMIT` / `ROLLBACK` SQL so that it can
/// share the connection mutex without rusqlite's borrow-based transaction
/// lifetimes.
pub struct SqliteTransaction {
    conn: Arc<Mutex<RusqliteConnection>>,
    finished: AtomicBool,
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        // an abandoned transaction leaves the connection unusable; issue a
        // best-effort rollback
        if !self.finished.load(Ordering::SeqCst) {
            tracing::warn!("SQLite transaction dropped without commit or rollback, rolling back");
            let conn = self.conn.lock();
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        }
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let conn = self.conn.lock();
        SqliteConnection::run_execute(&conn, sql, params)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let conn = self.conn.lock();
        SqliteConnection::run_query(&conn, sql, params)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        tracing::debug!("committing SQLite transaction");
        let conn = self.conn.lock();
        conn.execute_batch("COMMIT")
            .map_err(|e| DbError::Query(format!("failed to commit transaction: {}", e)))?;
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back SQLite transaction");
        let conn = self.conn.lock();
        conn.execute_batch("ROLLBACK")
            .map_err(|e| DbError::Query(format!("failed to rollback transaction: {}", e)))?;
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(*b as i64),
        Value::Int(i) => rusqlite::types::Value::Integer(*i),
        Value::Uint(u) => match i64::try_from(*u) {
            Ok(i) => rusqlite::types::Value::Integer(i),
            Err(_) => rusqlite::types::Value::Text(u.to_string()),
        },
        Value::Float(f) => rusqlite::types::Value::Real(*f),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Time(t) => rusqlite::types::Value::Text(t.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::Json(j) => rusqlite::types::Value::Text(j.to_string()),
        // SQLite has no named parameters in this layer; bind the inner value
        Value::Named { value, .. } => value_to_rusqlite(value),
    }
}

fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| DbError::Query(e.to_string()))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    };

    Ok(value)
}
