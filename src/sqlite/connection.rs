use std::fmt;
use std::sync::Arc;

use crate::error::SqlRunnerError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::config::{SharedSqliteConnection, SqlitePooledConnection};
use super::params::Params;
use super::query::execute_statement;

/// Connection wrapper backed by a bb8 pooled `SQLite` connection.
///
/// Every call hops onto the blocking pool; statements on one connection never overlap.
pub struct SqliteConnection {
    pub(crate) conn: SqlitePooledConnection,
}

impl SqliteConnection {
    pub(crate) fn new(conn: SqlitePooledConnection) -> Self {
        Self { conn }
    }

    /// Execute one statement with positional `?N` parameters.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::SqliteError` when preparing or running the statement fails.
    pub async fn execute(
        &self,
        query: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlRunnerError> {
        let sql_owned = query.to_owned();
        let values = Params::convert(params).0;
        run_blocking(self.conn_handle(), move |guard| {
            execute_statement(guard, &sql_owned, &values)
        })
        .await
    }

    /// Run a parameterless batch, e.g. transaction control.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::SqliteError` if any statement in the batch fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlRunnerError> {
        let sql_owned = sql.to_owned();
        run_blocking(self.conn_handle(), move |guard| {
            guard
                .execute_batch(&sql_owned)
                .map_err(SqlRunnerError::SqliteError)
        })
        .await
    }

    /// Run synchronous `rusqlite` logic against the underlying pooled connection.
    ///
    /// # Errors
    /// Returns whatever `func` returns, or `SqlRunnerError::ExecutionError` if the blocking task
    /// panics.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, SqlRunnerError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlRunnerError> + Send + 'static,
        R: Send + 'static,
    {
        run_blocking(self.conn_handle(), func).await
    }

    pub(crate) fn conn_handle(&self) -> SharedSqliteConnection {
        Arc::clone(&*self.conn)
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlRunnerError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlRunnerError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlRunnerError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}
