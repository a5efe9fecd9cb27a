//! SQLite driver registration

use crate::connection::SqliteConnection;
use async_trait::async_trait;
use sqlrelay_core::{Connection, Dialect, Driver, Result};
use std::sync::Arc;

/// SQLite driver; the DSN is the database path (or `:memory:`)
#[derive(Debug, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    async fn connect(&self, dsn: &str) -> Result<Arc<dyn Connection>> {
        let conn = SqliteConnection::open(dsn)?;
        Ok(Arc::new(conn))
    }
}
