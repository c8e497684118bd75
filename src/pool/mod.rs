pub mod connection;
pub mod types;

pub use connection::{MiddlewarePoolConnection, TxState};
pub use types::MiddlewarePool;

use crate::error::SqlRunnerError;
use crate::types::DatabaseType;

/// Configuration and connection pool for a database
///
/// This is the "engine" form of a connectable: every run checks out its own connection and
/// hands it back when the run ends.
#[derive(Clone, Debug)]
pub struct ConfigAndPool {
    /// The connection pool
    pub pool: MiddlewarePool,
    /// The database type
    pub db_type: DatabaseType,
}

impl ConfigAndPool {
    /// Check out a connection from the pool.
    ///
    /// # Errors
    /// Returns a pool or connection error if no connection can be obtained.
    pub async fn get_connection(&self) -> Result<MiddlewarePoolConnection, SqlRunnerError> {
        MiddlewarePool::get_connection(&self.pool).await
    }
}
