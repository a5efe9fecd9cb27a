//! Execution engine and primary/replica session router

use crate::config::{ConnectionConfig, Options};
use crate::pool::ConnPool;
use crate::scanner;
use crate::session::{Session, SessionPool};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rand::Rng;
use sqlrelay_core::{DbError, Dialect, ExecResult, QueryResult, Result, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide SQL logging toggle, independent of any connection
static DEBUG: AtomicBool = AtomicBool::new(false);

/// Enable or disable logging of every compiled SQL string and argument
/// vector before execution
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

/// Process-wide named engine registry (insert-only writes, many readers)
static REGISTRY: Lazy<RwLock<HashMap<String, DB>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Upper bound on parked session descriptors per engine
const SESSION_FREE_LIST_CAP: usize = 64;

/// A database handle owning one primary pool and zero or more replica
/// pools. Cloning is cheap; clones share the pools.
#[derive(Clone)]
pub struct DB {
    pools: Arc<Vec<Arc<ConnPool>>>,
    session_pool: Arc<SessionPool>,
    session: Option<Arc<Session>>,
    is_fixed: bool,
    id_key: String,
}

impl std::fmt::Debug for DB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DB")
            .field("is_fixed", &self.is_fixed)
            .field("id_key", &self.id_key)
            .finish_non_exhaustive()
    }
}

impl DB {
    /// Open a single-endpoint engine and verify it responds to ping
    pub async fn new(config: ConnectionConfig) -> Result<Self> {
        let pool = Arc::new(ConnPool::new(config));
        pool.ping().await?;
        Ok(Self::from_pools(vec![pool]))
    }

    /// Open a cluster: each config is opened in order, the first that
    /// pings becomes the primary, later ones become replicas. Unpingable
    /// endpoints are excluded.
    pub async fn new_cluster(configs: Vec<ConnectionConfig>) -> Result<Self> {
        let mut pools = Vec::with_capacity(configs.len());
        for config in configs {
            let dsn = config.dsn.clone();
            let pool = Arc::new(ConnPool::new(config));
            match pool.ping().await {
                Ok(()) => pools.push(pool),
                Err(err) => {
                    tracing::warn!(dsn = %dsn, error = %err, "excluding unpingable pool from cluster");
                }
            }
        }
        if pools.is_empty() {
            return Err(DbError::Connection(
                "no pingable endpoints in cluster".to_string(),
            ));
        }
        Ok(Self::from_pools(pools))
    }

    fn from_pools(pools: Vec<Arc<ConnPool>>) -> Self {
        Self {
            pools: Arc::new(pools),
            session_pool: Arc::new(SessionPool::new(SESSION_FREE_LIST_CAP)),
            session: None,
            is_fixed: false,
            id_key: "id".to_string(),
        }
    }

    /// Store this engine in the process-wide registry under `alias`
    pub fn register(&self, alias: impl Into<String>) {
        REGISTRY.write().insert(alias.into(), self.clone());
    }

    /// Look up a previously registered engine
    pub fn instance(alias: &str) -> Result<DB> {
        REGISTRY
            .read()
            .get(alias)
            .cloned()
            .ok_or(DbError::DbNotExist)
    }

    /// The dialect of the primary pool
    pub fn dialect(&self) -> Dialect {
        self.primary_pool().dialect()
    }

    /// The catalog name of the primary endpoint
    pub fn database(&self) -> &str {
        self.primary_pool().database()
    }

    /// The primary-key column used for LIMIT emulation and PostgreSQL
    /// RETURNING (default `id`)
    pub fn id_key(&self) -> &str {
        &self.id_key
    }

    pub fn set_id_key(&mut self, id_key: impl Into<String>) {
        self.id_key = id_key.into();
    }

    /// Whether this handle is pinned to a session (transaction or
    /// source/replica scope)
    pub fn is_fixed(&self) -> bool {
        self.is_fixed
    }

    /// Apply pool tunables (defaults, then your overrides) to every pool
    pub fn options(&self, f: impl FnOnce(&mut Options)) {
        let mut options = Options::default();
        f(&mut options);
        for pool in self.pools.iter() {
            pool.set_options(options.clone());
        }
    }

    fn primary_pool(&self) -> &Arc<ConnPool> {
        match self.session.as_ref() {
            Some(session) => session.pool(),
            None => &self.pools[0],
        }
    }

    /// Pick a session for one operation. A pinned engine always returns
    /// its own session; otherwise a descriptor comes off the free-list,
    /// bound to the primary pool or to a uniformly random replica.
    fn get_session(&self, primary: bool) -> Arc<Session> {
        if let Some(session) = &self.session {
            return session.clone();
        }
        let pool = if primary || self.pools.len() == 1 {
            self.pools[0].clone()
        } else {
            let idx = rand::thread_rng().gen_range(1..self.pools.len());
            self.pools[idx].clone()
        };
        self.session_pool.get(pool)
    }

    fn put_session(&self, session: Arc<Session>) {
        if self.session.is_none() {
            self.session_pool.put(session);
        }
    }

    fn pinned(&self, session: Arc<Session>) -> DB {
        DB {
            pools: self.pools.clone(),
            session_pool: self.session_pool.clone(),
            session: Some(session),
            is_fixed: true,
            id_key: self.id_key.clone(),
        }
    }

    fn log_sql(&self, sql: &str, args: &[Value]) {
        if debug_enabled() {
            tracing::info!(sql = %sql, args = ?args, "executing");
        }
    }

    /// Run a statement on the primary (or the pinned session)
    pub async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        self.log_sql(sql, args);
        let session = self.get_session(true);
        let result = session.exec(sql, args).await;
        self.put_session(session);
        result
    }

    /// Run a query on a replica (or the pinned session)
    pub async fn query(&self, sql: &str, args: &[Value]) -> Result<QueryResult> {
        self.log_sql(sql, args);
        let session = self.get_session(false);
        let result = session.query(sql, args).await;
        self.put_session(session);
        result
    }

    /// Run a query on the primary; catalog and read-after-write paths use
    /// this instead of [`DB::query`]
    pub(crate) async fn query_primary(&self, sql: &str, args: &[Value]) -> Result<QueryResult> {
        self.log_sql(sql, args);
        let session = self.get_session(true);
        let result = session.query(sql, args).await;
        self.put_session(session);
        result
    }

    /// Run `run` inside a transaction on the primary. The callback receives
    /// a pinned engine handle; every operation through it uses the same
    /// connection. On error the transaction is rolled back and the
    /// callback's error is returned (a rollback failure is logged, not
    /// surfaced). Nested calls reuse the open transaction.
    pub async fn transaction<T, F>(&self, run: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c DB) -> BoxFuture<'c, Result<T>>,
    {
        if let Some(session) = &self.session {
            if session.in_transaction().await {
                return run(self).await;
            }
            session.begin().await?;
            let result = run(self).await;
            return finish_transaction(session, result).await;
        }

        let session = self.get_session(true);
        session.begin().await?;
        let fixed = self.pinned(session.clone());
        let result = run(&fixed).await;
        drop(fixed);
        let outcome = finish_transaction(&session, result).await;
        self.put_session(session);
        outcome
    }

    /// Pin a callback to one primary-bound session (no transaction)
    pub async fn source<T, F>(&self, run: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c DB) -> BoxFuture<'c, Result<T>>,
    {
        self.scoped(true, run).await
    }

    /// Pin a callback to one replica-bound session (no transaction)
    pub async fn replica<T, F>(&self, run: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c DB) -> BoxFuture<'c, Result<T>>,
    {
        self.scoped(false, run).await
    }

    async fn scoped<T, F>(&self, primary: bool, run: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c DB) -> BoxFuture<'c, Result<T>>,
    {
        let session = self.get_session(primary);
        let fixed = self.pinned(session.clone());
        let result = run(&fixed).await;
        drop(fixed);
        self.put_session(session);
        result
    }

    /// Whether `table` exists, per the dialect's catalog view
    pub async fn has_table(&self, table: &str) -> Result<bool> {
        let probe = self.dialect().has_table(self.database(), table);
        let result = self.query_primary(&probe.sql, &probe.args).await?;
        let maps = scanner::scan_maps(&result);
        Ok((probe.project)(&maps))
    }

    /// Column name → type map for `table`, per the dialect's catalog view
    pub async fn get_columns(&self, table: &str) -> Result<HashMap<String, String>> {
        let probe = self.dialect().get_column(self.database(), table);
        let result = self.query_primary(&probe.sql, &probe.args).await?;
        let maps = scanner::scan_maps(&result);
        Ok((probe.project)(&maps))
    }

    /// Whether an index named `name` exists on `table`
    pub async fn has_index(&self, table: &str, name: &str) -> Result<bool> {
        let probe = self.dialect().has_index(self.database(), table, name);
        let result = self.query_primary(&probe.sql, &probe.args).await?;
        let maps = scanner::scan_maps(&result);
        Ok((probe.project)(&maps))
    }
}

async fn finish_transaction<T>(session: &Arc<Session>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            // the callback's error wins over any rollback failure
            if let Err(rollback_err) = session.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed transaction callback");
            }
            Err(err)
        }
    }
}
