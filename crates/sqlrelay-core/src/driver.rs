//! Driver contract consumed by the execution engine
//!
//! Each dialect crate fulfills these traits; the engine routes compiled SQL
//! through them without knowing anything about the wire protocol.

use crate::{Dialect, ExecResult, QueryResult, Result, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// A database driver: knows its dialect and how to open connections
#[async_trait]
pub trait Driver: Send + Sync {
    /// The dialect this driver speaks
    fn dialect(&self) -> Dialect;

    /// Open a connection for the given DSN
    async fn connect(&self, dsn: &str) -> Result<Arc<dyn Connection>>;
}

/// A database connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Check the connection is alive
    async fn ping(&self) -> Result<()>;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Begin a transaction
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A database transaction.
///
/// Commit and rollback consume the handle; executing after either is a
/// type-level impossibility rather than a runtime error.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Execute a statement within the transaction
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult>;

    /// Execute a query within the transaction
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}
