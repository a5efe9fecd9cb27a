//! Lazily-opened connection pool
//!
//! One pool per [`ConnectionConfig`]. Connections are created on demand up
//! to `max_open_conns`, parked on an idle queue up to `max_idle_conns`,
//! and recycled once they outlive `conn_max_lifetime`.

use crate::config::{ConnectionConfig, Options};
use parking_lot::Mutex;
use sqlrelay_core::{Connection, DbError, Dialect, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

struct IdleConn {
    conn: Arc<dyn Connection>,
    created_at: Instant,
}

/// A connection pool bound to one endpoint
pub struct ConnPool {
    config: ConnectionConfig,
    options: Mutex<Options>,
    semaphore: Mutex<Arc<Semaphore>>,
    idle: Mutex<VecDeque<IdleConn>>,
}

impl ConnPool {
    pub fn new(config: ConnectionConfig) -> Self {
        let options = Options::default();
        Self {
            config,
            semaphore: Mutex::new(Arc::new(Semaphore::new(options.max_open_conns))),
            options: Mutex::new(options),
            idle: Mutex::new(VecDeque::new()),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.config.driver.dialect()
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Replace the pool tunables. The open-connection cap applies to
    /// acquisitions from this point on; connections already checked out
    /// keep their original permits.
    pub fn set_options(&self, options: Options) {
        let mut sem = self.semaphore.lock();
        *sem = Arc::new(Semaphore::new(options.max_open_conns));
        *self.options.lock() = options;

        // trim the idle queue down to the new cap
        let max_idle = self.options.lock().max_idle_conns;
        let mut idle = self.idle.lock();
        while idle.len() > max_idle {
            idle.pop_front();
        }
    }

    /// Borrow a connection, opening a new one when the idle queue is empty
    pub async fn get(self: &Arc<Self>) -> Result<PooledConn> {
        let semaphore = self.semaphore.lock().clone();
        let permit = tokio::time::timeout(ACQUIRE_TIMEOUT, semaphore.acquire_owned())
            .await
            .map_err(|_| {
                DbError::Timeout(format!(
                    "waited {:?} for a connection slot",
                    ACQUIRE_TIMEOUT
                ))
            })?
            .map_err(|_| DbError::Connection("pool semaphore closed".into()))?;

        let conn = match self.take_idle() {
            Some(conn) => conn,
            None => {
                tracing::debug!(dsn = %self.config.dsn, dialect = %self.dialect(), "opening new connection");
                self.config.driver.connect(&self.config.dsn).await?
            }
        };

        Ok(PooledConn {
            conn: Some(conn),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    fn take_idle(&self) -> Option<Arc<dyn Connection>> {
        let max_lifetime = self.options.lock().conn_max_lifetime;
        let mut idle = self.idle.lock();
        while let Some(entry) = idle.pop_back() {
            if entry.created_at.elapsed() > max_lifetime {
                // aged out; dropping the handle closes it
                continue;
            }
            if entry.conn.is_closed() {
                continue;
            }
            return Some(entry.conn);
        }
        None
    }

    fn put_back(&self, conn: Arc<dyn Connection>) {
        if conn.is_closed() {
            return;
        }
        let max_idle = self.options.lock().max_idle_conns;
        let mut idle = self.idle.lock();
        if idle.len() < max_idle {
            idle.push_back(IdleConn {
                conn,
                created_at: Instant::now(),
            });
        }
    }

    /// Open a connection and ping it
    pub async fn ping(self: &Arc<Self>) -> Result<()> {
        let conn = self.get().await?;
        conn.ping().await
    }

    /// Number of idle connections currently parked
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// A connection borrowed from the pool; returned on drop
pub struct PooledConn {
    conn: Option<Arc<dyn Connection>>,
    pool: Arc<ConnPool>,
    _permit: OwnedSemaphorePermit,
}

impl std::ops::Deref for PooledConn {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_deref().expect("connection taken")
    }
}

impl PooledConn {
    /// The underlying connection handle
    pub fn inner(&self) -> &Arc<dyn Connection> {
        self.conn.as_ref().expect("connection taken")
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}
