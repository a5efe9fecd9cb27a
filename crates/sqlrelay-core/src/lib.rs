//! Core types for sqlrelay: the value model, error taxonomy, dialect
//! registry, declarative column schema, and the driver contract.

mod dialect;
mod driver;
mod error;
mod field;
mod types;

pub use dialect::{CatalogQuery, Dialect};
pub use driver::{Connection, Driver, Transaction};
pub use error::{DbError, Result};
pub use field::{DataType, Field};
pub use types::{ExecResult, Maps, QueryResult, Row, Value};
