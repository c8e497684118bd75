//! Statement-by-statement execution: render, bind, run in a transaction, report.
//!
//! Each statement gets its own transaction where the connection allows one, so a failure
//! only rolls back the statement that caused it.

mod options;
mod outcome;
mod stream;

pub use options::RunOptions;
pub use outcome::{ExecutionOutcome, ExecutionPath, StatementFailure, StatementSuccess};
pub use stream::{
    QueryStream, RunResults, run_queries, run_queries_stream, run_query_file, run_single,
    run_single_with_reporter, run_sql,
};
