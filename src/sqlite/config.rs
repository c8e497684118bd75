use std::future::Future;
use std::sync::Arc;

use bb8::{ManageConnection, Pool, PooledConnection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SqlRunnerError;
use crate::pool::{ConfigAndPool, MiddlewarePool};
use crate::types::DatabaseType;

use super::connection::run_blocking;

pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;
pub type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

const IN_MEMORY: &str = ":memory:";

/// Options for configuring a `SQLite` pool.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// Maximum pooled connections; an in-memory database is always capped at one.
    pub max_size: u32,
    /// Switch file databases to WAL journaling when the pool is created.
    pub wal: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            max_size: 4,
            wal: true,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.opts.max_size = max_size;
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a `ConfigAndPool` for `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqlRunnerError` if pool creation or the initial pragma setup fails.
    pub async fn build(self) -> Result<ConfigAndPool, SqlRunnerError> {
        ConfigAndPool::new_sqlite(self.finish()).await
    }
}

/// bb8 manager handing out shared `rusqlite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
}

impl SqliteManager {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = SqlRunnerError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.db_path.clone();
        async move {
            let conn = tokio::task::spawn_blocking(move || rusqlite::Connection::open(path))
                .await
                .map_err(|e| {
                    SqlRunnerError::ConnectionError(format!("sqlite open join error: {e}"))
                })??;
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            run_blocking(handle, |guard| {
                guard
                    .query_row("SELECT 1", [], |_| Ok(()))
                    .map_err(SqlRunnerError::SqliteError)
            })
            .await
        }
    }

    // A connection handed back mid-transaction is discarded rather than reused.
    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.try_lock().is_ok_and(|guard| !guard.is_autocommit())
    }
}

impl ConfigAndPool {
    #[must_use]
    pub fn sqlite_builder(db_path: impl Into<String>) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Create a bb8-backed `SQLite` pool.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ConfigError` for an empty path or a zero pool size, and
    /// `SqlRunnerError::ConnectionError` if the database can't be opened.
    pub async fn new_sqlite(opts: SqliteOptions) -> Result<Self, SqlRunnerError> {
        if opts.db_path.trim().is_empty() {
            return Err(SqlRunnerError::ConfigError(
                "db_path is required".to_string(),
            ));
        }
        if opts.max_size == 0 {
            return Err(SqlRunnerError::ConfigError(
                "max_size must be at least 1".to_string(),
            ));
        }
        let max_size = if opts.is_in_memory() { 1 } else { opts.max_size };

        let pool = Pool::builder()
            .max_size(max_size)
            .build(SqliteManager::new(opts.db_path.clone()))
            .await
            .map_err(|e| {
                SqlRunnerError::ConnectionError(format!("Failed to create SQLite pool: {e}"))
            })?;

        if opts.wal && !opts.is_in_memory() {
            let conn = pool.get().await?;
            let handle = Arc::clone(&*conn);
            run_blocking(handle, |guard| {
                guard
                    .execute_batch("PRAGMA journal_mode = WAL;")
                    .map_err(SqlRunnerError::SqliteError)
            })
            .await?;
        }
        debug!(db_path = %opts.db_path, max_size, "sqlite pool ready");

        Ok(ConfigAndPool {
            pool: MiddlewarePool::Sqlite(pool),
            db_type: DatabaseType::Sqlite,
        })
    }
}
