//! SQLite driver for sqlrelay, backed by rusqlite.

mod connection;
mod driver;

pub use connection::{SqliteConnection, SqliteTransaction};
pub use driver::SqliteDriver;
