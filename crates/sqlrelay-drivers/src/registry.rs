//! Driver registry for managing available database drivers

use sqlrelay_core::{DbError, Driver, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers, keyed by lowercase name
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register("sqlite", Arc::new(crate::sqlite::SqliteDriver::new()));
        #[cfg(feature = "postgres")]
        registry.register("postgres", Arc::new(crate::postgres::PostgresDriver::new()));
        #[cfg(feature = "mysql")]
        {
            registry.register("mysql", Arc::new(crate::mysql::MySqlDriver::new()));
            registry.register("doris", Arc::new(crate::mysql::DorisDriver::new()));
        }

        registry
    }

    /// Register a driver under `name`
    pub fn register(&mut self, name: &str, driver: Arc<dyn Driver>) {
        tracing::info!(driver = %name, dialect = %driver.dialect(), "registering database driver");
        self.drivers.insert(name.to_lowercase(), driver);
    }

    /// Get a driver by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        let driver = self.drivers.get(&name.to_lowercase()).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver names
    pub fn list(&self) -> Vec<&str> {
        self.drivers.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a driver is registered
    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(&name.to_lowercase())
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Look up a built-in driver by name without holding a registry.
/// For repeated lookups, prefer a cached [`DriverRegistry`].
pub fn driver_for(name: &str) -> Result<Arc<dyn Driver>> {
    DriverRegistry::with_defaults()
        .get(name)
        .ok_or_else(|| DbError::Exception(format!("no driver registered for {:?}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_builtin_drivers() {
        let registry = DriverRegistry::with_defaults();
        #[cfg(feature = "sqlite")]
        assert!(registry.has("sqlite"));
        #[cfg(feature = "postgres")]
        assert!(registry.has("postgres"));
        #[cfg(feature = "mysql")]
        {
            assert!(registry.has("mysql"));
            assert!(registry.has("MySQL"));
            assert!(registry.has("doris"));
        }
        assert!(!registry.has("oracle"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn driver_for_reports_dialect() {
        use sqlrelay_core::Dialect;
        let driver = driver_for("sqlite").unwrap();
        assert_eq!(driver.dialect(), Dialect::SQLite);
        assert!(driver_for("nope").is_err());
    }
}
