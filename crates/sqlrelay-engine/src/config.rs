//! Engine configuration types

use sqlrelay_core::Driver;
use std::sync::Arc;
use std::time::Duration;

/// Connection pool tunables applied to every pool of an engine
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum idle connections held per pool
    pub max_idle_conns: usize,
    /// Maximum open connections per pool
    pub max_open_conns: usize,
    /// Maximum lifetime of a connection before it is recycled
    pub conn_max_lifetime: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_idle_conns: 10,
            max_open_conns: 100,
            conn_max_lifetime: Duration::from_secs(30 * 60),
        }
    }
}

/// One database endpoint: a driver, its DSN, and the catalog name used by
/// introspection queries. The pool itself is opened lazily on first use.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub driver: Arc<dyn Driver>,
    pub dsn: String,
    /// Database/catalog name for catalog queries; empty for engines that do
    /// not need one (SQLite)
    pub database: String,
}

impl ConnectionConfig {
    pub fn new(driver: Arc<dyn Driver>, dsn: impl Into<String>) -> Self {
        Self {
            driver,
            dsn: dsn.into(),
            database: String::new(),
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }
}
