//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::classify::{Classified, ErrorClass, Severity};
pub use crate::compose::Fragment;
pub use crate::connectable::{Capabilities, Connectable};
pub use crate::error::SqlRunnerError;
pub use crate::params::{DriverParams, Param, ParamSet, Params, PreBindParams};
pub use crate::pool::{ConfigAndPool, MiddlewarePool, MiddlewarePoolConnection, TxState};
pub use crate::report::{LineStyle, ReportLine, ReportSink, Reporter};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::runner::{
    ExecutionOutcome, ExecutionPath, QueryStream, RunOptions, RunResults, StatementFailure,
    StatementSuccess, run_queries, run_queries_stream, run_query_file, run_single,
    run_single_with_reporter, run_sql,
};
pub use crate::secret::Secret;
pub use crate::splitter::{SqlInput, Statement};
pub use crate::translation::PlaceholderStyle;
pub use crate::types::{DatabaseType, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresOptions, PostgresOptionsBuilder};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteOptions, SqliteOptionsBuilder};
