//! Execution engine for sqlrelay: connection pools, sessions, the
//! primary/replica router with transaction scoping, the row scanner, and
//! typed CRUD entry points over the builders.

mod config;
mod crud;
mod engine;
mod pool;
mod scanner;
mod session;

pub use config::{ConnectionConfig, Options};
pub use crud::{BatchConfig, PageInfo};
pub use engine::{DB, debug_enabled, set_debug};
pub use pool::{ConnPool, PooledConn};
pub use scanner::{parse_time, scan, scan_maps, scan_one, scan_time};
pub use session::Session;
