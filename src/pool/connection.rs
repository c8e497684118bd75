use tracing::debug;

#[cfg(feature = "postgres")]
use crate::postgres::config::PgPooledConnection;
#[cfg(feature = "sqlite")]
use crate::sqlite::SqliteConnection;

use super::types::MiddlewarePool;
use crate::connectable::Cursor;
use crate::error::SqlRunnerError;
use crate::types::DatabaseType;

/// Who opened the transaction currently active on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    #[default]
    Idle,
    /// Opened through [`MiddlewarePoolConnection::begin`].
    Caller,
    /// Opened by the runner for a single statement.
    Runner,
}

/// A pooled connection plus the transaction it is currently in.
pub enum MiddlewarePoolConnection {
    #[cfg(feature = "postgres")]
    Postgres {
        client: PgPooledConnection,
        tx: TxState,
    },
    #[cfg(feature = "sqlite")]
    Sqlite {
        conn: SqliteConnection,
        tx: TxState,
    },
}

impl std::fmt::Debug for MiddlewarePoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres { tx, .. } => f.debug_struct("Postgres").field("tx", tx).finish(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite { conn, tx } => f
                .debug_struct("Sqlite")
                .field("conn", conn)
                .field("tx", tx)
                .finish(),
        }
    }
}

impl MiddlewarePool {
    /// Get a connection from the pool
    ///
    /// # Errors
    /// Returns `SqlRunnerError::PoolErrorPostgres` or the `SQLite` manager's error if the pool
    /// fails to provide a connection.
    pub async fn get_connection(
        pool: &MiddlewarePool,
    ) -> Result<MiddlewarePoolConnection, SqlRunnerError> {
        match pool {
            #[cfg(feature = "postgres")]
            MiddlewarePool::Postgres(pool) => {
                let client = pool.get_owned().await?;
                Ok(MiddlewarePoolConnection::Postgres {
                    client,
                    tx: TxState::Idle,
                })
            }
            #[cfg(feature = "sqlite")]
            MiddlewarePool::Sqlite(pool) => {
                let conn = pool.get_owned().await?;
                Ok(MiddlewarePoolConnection::Sqlite {
                    conn: SqliteConnection::new(conn),
                    tx: TxState::Idle,
                })
            }
        }
    }
}

impl MiddlewarePoolConnection {
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres { .. } => DatabaseType::Postgres,
            #[cfg(feature = "sqlite")]
            Self::Sqlite { .. } => DatabaseType::Sqlite,
        }
    }

    #[must_use]
    pub fn tx_state(&self) -> TxState {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres { tx, .. } => *tx,
            #[cfg(feature = "sqlite")]
            Self::Sqlite { tx, .. } => *tx,
        }
    }

    fn set_tx_state(&mut self, state: TxState) {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres { tx, .. } => *tx = state,
            #[cfg(feature = "sqlite")]
            Self::Sqlite { tx, .. } => *tx = state,
        }
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx_state() != TxState::Idle
    }

    /// The raw driver handle for this connection.
    #[must_use]
    pub fn cursor(&self) -> Cursor<'_> {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres { client, .. } => Cursor::Postgres(client),
            #[cfg(feature = "sqlite")]
            Self::Sqlite { conn, .. } => Cursor::Sqlite(conn),
        }
    }

    async fn run_control(&self, sql: &'static str) -> Result<(), SqlRunnerError> {
        debug!(statement = sql, "transaction control");
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres { client, .. } => Ok(client.batch_execute(sql).await?),
            #[cfg(feature = "sqlite")]
            Self::Sqlite { conn, .. } => conn.execute_batch(sql).await,
        }
    }

    /// Open a transaction owned by the caller.
    ///
    /// While it is open, runs on this connection don't begin their own transactions; each
    /// statement commits the caller's transaction instead.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::InvalidRequest` if a transaction is already active.
    pub async fn begin(&mut self) -> Result<(), SqlRunnerError> {
        if self.in_transaction() {
            return Err(SqlRunnerError::InvalidRequest(
                "a transaction is already active on this connection".into(),
            ));
        }
        self.run_control("BEGIN").await?;
        self.set_tx_state(TxState::Caller);
        Ok(())
    }

    /// Commit the active transaction.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::InvalidRequest` when no transaction is active.
    pub async fn commit(&mut self) -> Result<(), SqlRunnerError> {
        if !self.in_transaction() {
            return Err(SqlRunnerError::InvalidRequest(
                "no transaction is active on this connection".into(),
            ));
        }
        self.run_control("COMMIT").await?;
        self.set_tx_state(TxState::Idle);
        Ok(())
    }

    /// Roll back the active transaction.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::InvalidRequest` when no transaction is active.
    pub async fn rollback(&mut self) -> Result<(), SqlRunnerError> {
        if !self.in_transaction() {
            return Err(SqlRunnerError::InvalidRequest(
                "no transaction is active on this connection".into(),
            ));
        }
        // Backend state is reset even if ROLLBACK itself fails.
        let result = self.run_control("ROLLBACK").await;
        self.set_tx_state(TxState::Idle);
        result
    }

    /// Begin the per-statement transaction.
    ///
    /// A runner transaction left open by an abandoned step is rolled back first. A caller
    /// transaction is left alone and reported as `InvalidRequest`.
    pub(crate) async fn begin_statement(&mut self) -> Result<(), SqlRunnerError> {
        match self.tx_state() {
            TxState::Caller => {
                return Err(SqlRunnerError::InvalidRequest(
                    "caller transaction already active".into(),
                ));
            }
            TxState::Runner => {
                debug!("rolling back leftover statement transaction");
                self.rollback().await?;
            }
            TxState::Idle => {}
        }
        self.run_control("BEGIN").await?;
        self.set_tx_state(TxState::Runner);
        Ok(())
    }
}
