//! PostgreSQL driver registration

use crate::connection::PostgresConnection;
use async_trait::async_trait;
use sqlrelay_core::{Connection, Dialect, Driver, Result};
use std::sync::Arc;

/// PostgreSQL driver; the DSN uses libpq keyword form
/// (`host=localhost port=5432 dbname=app user=app password=secret`)
#[derive(Debug, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSQL
    }

    async fn connect(&self, dsn: &str) -> Result<Arc<dyn Connection>> {
        let conn = PostgresConnection::connect(dsn).await?;
        Ok(Arc::new(conn))
    }
}
