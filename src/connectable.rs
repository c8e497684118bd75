//! What a run executes against, and the raw handle used for each statement.

use std::ops::{Deref, DerefMut};

use tracing::debug;

#[cfg(feature = "sqlite")]
use crate::sqlite::SqliteConnection;

use crate::error::SqlRunnerError;
use crate::params::DriverParams;
use crate::pool::{ConfigAndPool, MiddlewarePoolConnection};
use crate::results::ResultSet;
use crate::translation::{rewrite_named_binds, rewrite_pyformat};
use crate::types::{DatabaseType, RowValues};

/// The target of a run.
#[derive(Debug)]
pub enum Connectable<'a> {
    /// Check out a fresh connection for the run and return it to the pool afterwards.
    Engine(&'a ConfigAndPool),
    /// Use an existing connection, leaving it open after the run.
    Connection(&'a mut MiddlewarePoolConnection),
    /// Use an existing connection without any transaction demarcation, for statements such
    /// as `VACUUM` that can't run inside a transaction.
    Autocommit(&'a mut MiddlewarePoolConnection),
}

impl<'a> From<&'a ConfigAndPool> for Connectable<'a> {
    fn from(value: &'a ConfigAndPool) -> Self {
        Connectable::Engine(value)
    }
}

impl<'a> From<&'a mut MiddlewarePoolConnection> for Connectable<'a> {
    fn from(value: &'a mut MiddlewarePoolConnection) -> Self {
        Connectable::Connection(value)
    }
}

/// What the runner may do with a resolved connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_begin_transaction: bool,
    pub can_commit: bool,
    pub can_rollback: bool,
    /// The connection belongs to the run and is released when the run ends.
    pub can_close: bool,
}

impl Connectable<'_> {
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Connectable::Engine(_) => Capabilities {
                can_begin_transaction: true,
                can_commit: true,
                can_rollback: true,
                can_close: true,
            },
            Connectable::Connection(_) => Capabilities {
                can_begin_transaction: true,
                can_commit: true,
                can_rollback: true,
                can_close: false,
            },
            Connectable::Autocommit(_) => Capabilities {
                can_begin_transaction: false,
                can_commit: false,
                can_rollback: false,
                can_close: false,
            },
        }
    }
}

/// A connection usable for the length of a run.
#[derive(Debug)]
pub enum ResolvedConnection<'a> {
    Owned(MiddlewarePoolConnection),
    Borrowed(&'a mut MiddlewarePoolConnection),
}

impl Deref for ResolvedConnection<'_> {
    type Target = MiddlewarePoolConnection;

    fn deref(&self) -> &Self::Target {
        match self {
            ResolvedConnection::Owned(conn) => conn,
            ResolvedConnection::Borrowed(conn) => conn,
        }
    }
}

impl DerefMut for ResolvedConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            ResolvedConnection::Owned(conn) => conn,
            ResolvedConnection::Borrowed(conn) => conn,
        }
    }
}

/// Turn a connectable into a usable connection and its capabilities.
///
/// # Errors
/// Returns the pool's error when an engine can't provide a connection.
pub async fn resolve_connection(
    connectable: Connectable<'_>,
) -> Result<(ResolvedConnection<'_>, Capabilities), SqlRunnerError> {
    let capabilities = connectable.capabilities();
    let resolved = match connectable {
        Connectable::Engine(engine) => {
            debug!(db_type = ?engine.db_type, "checking out connection");
            ResolvedConnection::Owned(engine.get_connection().await?)
        }
        Connectable::Connection(conn) | Connectable::Autocommit(conn) => {
            ResolvedConnection::Borrowed(conn)
        }
    };
    Ok((resolved, capabilities))
}

/// Raw driver handle of a connection.
pub enum Cursor<'a> {
    #[cfg(feature = "postgres")]
    Postgres(&'a tokio_postgres::Client),
    #[cfg(feature = "sqlite")]
    Sqlite(&'a SqliteConnection),
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            Cursor::Postgres(_) => f.write_str("Cursor::Postgres"),
            #[cfg(feature = "sqlite")]
            Cursor::Sqlite(_) => f.write_str("Cursor::Sqlite"),
        }
    }
}

impl Cursor<'_> {
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "postgres")]
            Cursor::Postgres(_) => DatabaseType::Postgres,
            #[cfg(feature = "sqlite")]
            Cursor::Sqlite(_) => DatabaseType::Sqlite,
        }
    }

    /// Execute `sql` written with driver-level `%s` / `%(name)s` placeholders.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ParameterError` when placeholders and parameters disagree, or
    /// the backend's error.
    pub async fn exec_driver_sql(
        &self,
        sql: &str,
        params: Option<&DriverParams>,
    ) -> Result<ResultSet, SqlRunnerError> {
        let (native, values) =
            rewrite_pyformat(sql, self.database_type().placeholder_style(), params)?;
        self.execute_native(&native, &values).await
    }

    /// Execute `sql` written with portable `:name` binds (or backend positional placeholders).
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ParameterError` for a bind without a value, or the backend's
    /// error.
    pub async fn execute_text(
        &self,
        sql: &str,
        params: Option<&DriverParams>,
    ) -> Result<ResultSet, SqlRunnerError> {
        let (native, values) =
            rewrite_named_binds(sql, self.database_type().placeholder_style(), params)?;
        self.execute_native(&native, &values).await
    }

    async fn execute_native(
        &self,
        sql: &str,
        values: &[RowValues],
    ) -> Result<ResultSet, SqlRunnerError> {
        debug!(sql, params = values.len(), "executing statement");
        match self {
            #[cfg(feature = "postgres")]
            Cursor::Postgres(client) => {
                crate::postgres::execute_statement(client, sql, values).await
            }
            #[cfg(feature = "sqlite")]
            Cursor::Sqlite(conn) => conn.execute(sql, values).await,
        }
    }
}
