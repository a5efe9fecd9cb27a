//! MySQL driver for sqlrelay, backed by mysql_async. Doris speaks the
//! MySQL wire protocol, so the same driver serves Doris endpoints.

mod connection;
mod driver;

pub use connection::{MySqlConnection, MySqlTransaction};
pub use driver::{DorisDriver, MySqlDriver};
