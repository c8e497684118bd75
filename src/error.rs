use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlRunnerError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] bb8::RunError<tokio_postgres::Error>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error(
        "Parameter shape error: {parameter_sets} parameter sets supplied for {statements} statements"
    )]
    ParameterShapeError {
        statements: usize,
        parameter_sets: usize,
    },

    #[error("Render error: {0}")]
    RenderError(String),

    /// The connection cannot honour the request in its current state, e.g. `BEGIN` while a
    /// transaction is already open.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl From<bb8::RunError<SqlRunnerError>> for SqlRunnerError {
    fn from(err: bb8::RunError<SqlRunnerError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => {
                SqlRunnerError::ConnectionError("pool checkout timed out".to_string())
            }
        }
    }
}
