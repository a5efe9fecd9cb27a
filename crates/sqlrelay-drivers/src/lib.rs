//! Driver registry: maps dialect names to driver instances.
//!
//! MsSQL and ClickHouse are dialect-complete in `sqlrelay-core` but ship no
//! in-tree wire driver; external crates can implement [`Driver`] for them
//! and register through [`DriverRegistry::register`].

mod registry;

pub use registry::{DriverRegistry, driver_for};

#[cfg(feature = "sqlite")]
pub use sqlrelay_driver_sqlite as sqlite;

#[cfg(feature = "postgres")]
pub use sqlrelay_driver_postgres as postgres;

#[cfg(feature = "mysql")]
pub use sqlrelay_driver_mysql as mysql;

pub use sqlrelay_core::Driver;
