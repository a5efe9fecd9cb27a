//! Sessions: the binding from one operation to one connection pool,
//! optionally carrying a live transaction.

use crate::pool::{ConnPool, PooledConn};
use sqlrelay_core::{DbError, ExecResult, QueryResult, Result, Transaction, Value};
use std::sync::Arc;

struct SessionState {
    /// Live transaction, if any
    tx: Option<Box<dyn Transaction>>,
    /// Connection held for the transaction's lifetime so the pool cannot
    /// hand it to anyone else
    pinned: Option<PooledConn>,
}

/// A short-lived binding from an operation to a specific pool
pub struct Session {
    pool: Arc<ConnPool>,
    state: tokio::sync::Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(pool: Arc<ConnPool>) -> Self {
        Self {
            pool,
            state: tokio::sync::Mutex::new(SessionState {
                tx: None,
                pinned: None,
            }),
        }
    }

    pub(crate) fn pool(&self) -> &Arc<ConnPool> {
        &self.pool
    }

    /// Whether a transaction is currently open
    pub async fn in_transaction(&self) -> bool {
        self.state.lock().await.tx.is_some()
    }

    /// Execute a statement through the transaction when one is open,
    /// otherwise through a pooled connection.
    pub async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        let state = self.state.lock().await;
        if let Some(tx) = &state.tx {
            return tx.execute(sql, args).await;
        }
        drop(state);
        let conn = self.pool.get().await?;
        conn.execute(sql, args).await
    }

    /// Run a query through the transaction when one is open, otherwise
    /// through a pooled connection.
    pub async fn query(&self, sql: &str, args: &[Value]) -> Result<QueryResult> {
        let state = self.state.lock().await;
        if let Some(tx) = &state.tx {
            return tx.query(sql, args).await;
        }
        drop(state);
        let conn = self.pool.get().await?;
        conn.query(sql, args).await
    }

    /// Open a transaction, pinning one connection for its lifetime
    pub async fn begin(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.tx.is_some() {
            return Err(DbError::Exception(
                "session already holds a transaction".to_string(),
            ));
        }
        let conn = self.pool.get().await?;
        let tx = conn.inner().begin().await?;
        state.tx = Some(tx);
        state.pinned = Some(conn);
        Ok(())
    }

    /// Commit the open transaction and release the pinned connection
    pub async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let tx = state
            .tx
            .take()
            .ok_or_else(|| DbError::Exception("no open transaction to commit".to_string()))?;
        let result = tx.commit().await;
        state.pinned = None;
        result
    }

    /// Roll back the open transaction and release the pinned connection
    pub async fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let tx = state
            .tx
            .take()
            .ok_or_else(|| DbError::Exception("no open transaction to roll back".to_string()))?;
        let result = tx.rollback().await;
        state.pinned = None;
        result
    }
}

/// Bounded LIFO free-list of reusable session descriptors.
///
/// Acquisitions never wait: when the list is empty a fresh descriptor is
/// allocated, and descriptors past the bound are simply dropped.
pub(crate) struct SessionPool {
    free: parking_lot::Mutex<Vec<Session>>,
    cap: usize,
}

impl SessionPool {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            free: parking_lot::Mutex::new(Vec::new()),
            cap,
        }
    }

    /// Take a session bound to `pool`, reusing a parked descriptor if one
    /// is available.
    pub(crate) fn get(&self, pool: Arc<ConnPool>) -> Arc<Session> {
        let reused = self.free.lock().pop();
        match reused {
            Some(mut session) => {
                session.pool = pool;
                Arc::new(session)
            }
            None => Arc::new(Session::new(pool)),
        }
    }

    /// Return a session to the free-list. Sessions still shared elsewhere
    /// (a pinned engine holding its handle) or carrying a transaction are
    /// dropped instead of parked.
    pub(crate) fn put(&self, session: Arc<Session>) {
        if let Some(session) = Arc::into_inner(session) {
            let parked = session
                .state
                .try_lock()
                .map(|state| state.tx.is_none() && state.pinned.is_none())
                .unwrap_or(false);
            if parked {
                let mut free = self.free.lock();
                if free.len() < self.cap {
                    free.push(session);
                }
            }
        }
    }
}
