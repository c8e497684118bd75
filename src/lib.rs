//! Run scripts of SQL statements against Postgres or SQLite, one transaction per statement.
//!
//! Input text is split on top-level `;`, each statement's parameters are divided between driver
//! binds and pre-bind [`Fragment`]s, and the bind style is inferred per statement. Failures
//! that look like re-applying existing schema are reported as benign.
//!
//! ```rust,no_run
//! use sql_runner::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlRunnerError> {
//! let engine = ConfigAndPool::new_sqlite(SqliteOptions::in_memory()).await?;
//! let outcomes = run_queries(
//!     &engine,
//!     "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (%s);",
//!     Params::PerStatement(vec![None, Some(ParamSet::positional([1]))]),
//!     RunOptions::new(),
//! )
//! .await?;
//! assert!(outcomes.iter().all(ExecutionOutcome::is_success));
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod compose;
pub mod connectable;
pub mod error;
pub mod params;
pub mod pool;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod prelude;
pub mod report;
pub mod results;
pub mod runner;
pub mod secret;
pub mod splitter;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod translation;
pub mod types;

pub use classify::{Classified, ErrorClass, Severity, classify};
pub use compose::Fragment;
pub use connectable::{Capabilities, Connectable, Cursor, resolve_connection};
pub use error::SqlRunnerError;
pub use params::{DriverParams, Param, ParamSet, Params, PreBindParams, partition};
pub use pool::{ConfigAndPool, MiddlewarePool, MiddlewarePoolConnection, TxState};
pub use report::{ReportSink, Reporter};
pub use results::{CustomDbRow, ResultSet};
pub use runner::{
    ExecutionOutcome, ExecutionPath, QueryStream, RunOptions, RunResults, run_queries,
    run_queries_stream, run_query_file, run_single, run_single_with_reporter, run_sql,
};
pub use splitter::{
    SqlInput, Statement, TextInputKind, classify_text_input, split_input, split_statements,
    strip_comments,
};
pub use translation::needs_driver_level_execution;
pub use types::{DatabaseType, RowValues};

#[cfg(feature = "postgres")]
pub use postgres::PostgresOptions;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteOptions;
