//! Error types shared across the workspace

use thiserror::Error;

/// Core error type for sqlrelay operations.
///
/// The domain cases form a closed set; the remaining variants carry errors
/// surfaced by the underlying drivers without reinterpreting them.
#[derive(Error, Debug)]
pub enum DbError {
    /// Generic fallback for unexpected internal states
    #[error("unexpected internal state: {0}")]
    Exception(String),

    /// Empty result where at least one row was expected
    #[error("record not found")]
    NotFound,

    /// INSERT/REPLACE/batch insert with no column values
    #[error("insert data can not be empty")]
    InsertEmpty,

    /// Input value map or struct cannot be parsed into columns
    #[error("data is invalid: {0}")]
    DataInvalid(String),

    /// UPDATE or DELETE without any WHERE clause
    #[error("missing WHERE condition")]
    NoWhere,

    /// Scanner cannot coerce a value to the target type
    #[error("cannot convert {from} to {to}")]
    ConversionFailed { from: String, to: String },

    /// Scanner received a destination it cannot write into
    #[error("destination is not settable")]
    TargetNotSettable,

    /// Engine lookup by alias failed
    #[error("database instance does not exist")]
    DbNotExist,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// Build a `ConversionFailed` from source and target type names.
    pub fn conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        DbError::ConversionFailed {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Result type alias for sqlrelay operations
pub type Result<T> = std::result::Result<T, DbError>;
