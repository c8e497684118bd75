use std::path::Path;

use tracing::{debug, error, warn};

use crate::classify::{ErrorClass, classify};
use crate::compose::Fragment;
use crate::connectable::{Capabilities, Connectable, ResolvedConnection, resolve_connection};
use crate::error::SqlRunnerError;
use crate::params::{DriverParams, ParamSet, Params, PreBindParams, partition};
use crate::pool::MiddlewarePoolConnection;
use crate::report::Reporter;
use crate::splitter::{
    SqlInput, Statement, TextInputKind, classify_text_input, split_input, strip_comments,
};
use crate::translation::needs_driver_level_execution;
use crate::types::DatabaseType;

use super::options::RunOptions;
use super::outcome::{ExecutionOutcome, ExecutionPath, StatementFailure, StatementSuccess};

/// Statements of one run, executed one per [`QueryStream::next`] call.
///
/// Dropping the stream leaves the remaining statements unexecuted. After an error is returned
/// the stream is finished.
pub struct QueryStream<'a> {
    conn: ResolvedConnection<'a>,
    capabilities: Capabilities,
    statements: std::iter::Enumerate<std::vec::IntoIter<Statement>>,
    params: Params,
    options: RunOptions,
    finished: bool,
}

impl std::fmt::Debug for QueryStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryStream")
            .field("capabilities", &self.capabilities)
            .field("remaining", &self.remaining())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Results of [`run_sql`]: everything at once, or a stream to drive.
#[derive(Debug)]
pub enum RunResults<'a> {
    Collected(Vec<ExecutionOutcome>),
    Streaming(QueryStream<'a>),
}

impl RunResults<'_> {
    /// Drive any remaining statements and return every outcome.
    ///
    /// # Errors
    /// Returns the first error that ends the run.
    pub async fn into_outcomes(self) -> Result<Vec<ExecutionOutcome>, SqlRunnerError> {
        match self {
            RunResults::Collected(outcomes) => Ok(outcomes),
            RunResults::Streaming(stream) => stream.collect().await,
        }
    }
}

impl<'a> QueryStream<'a> {
    /// Statements not yet executed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        if self.finished {
            0
        } else {
            self.statements.len()
        }
    }

    /// Execute the next statement.
    ///
    /// Returns `None` once every statement has run or after an error ended the run.
    pub async fn next(&mut self) -> Option<Result<ExecutionOutcome, SqlRunnerError>> {
        if self.finished {
            return None;
        }
        let Some((index, statement)) = self.statements.next() else {
            self.finished = true;
            return None;
        };
        let outcome = self.step(index, statement).await;
        if outcome.is_err() {
            self.finished = true;
        }
        Some(outcome)
    }

    /// Run every remaining statement.
    ///
    /// # Errors
    /// Returns the first error that ends the run; earlier outcomes are discarded.
    pub async fn collect(mut self) -> Result<Vec<ExecutionOutcome>, SqlRunnerError> {
        let mut outcomes = Vec::with_capacity(self.remaining());
        while let Some(outcome) = self.next().await {
            outcomes.push(outcome?);
        }
        Ok(outcomes)
    }

    async fn step(
        &mut self,
        index: usize,
        statement: Statement,
    ) -> Result<ExecutionOutcome, SqlRunnerError> {
        let (driver, prebind) = partition(self.params.for_statement(index));
        let rendered = render_statement(statement, prebind.as_ref(), self.conn.database_type())?;
        let sql = strip_comments(&rendered).trim().to_string();
        if sql.is_empty() {
            debug!(index, "skipping empty statement");
            return Ok(ExecutionOutcome::Skipped { index });
        }

        let path = match self.options.has_server_binds {
            Some(true) => ExecutionPath::DriverLevel,
            Some(false) => ExecutionPath::Portable,
            None if needs_driver_level_execution(&sql) => ExecutionPath::DriverLevel,
            None => ExecutionPath::Portable,
        };

        let explicit = self.begin().await?;
        let executed = match execute(&self.conn, &sql, path, driver.as_ref()).await {
            Ok(result) => self.commit(explicit).await.map(|()| result),
            Err(err) => Err(err),
        };

        match executed {
            Ok(result) => {
                self.options.reporter.statement_ok(&sql);
                Ok(ExecutionOutcome::Success(StatementSuccess {
                    index,
                    sql,
                    path,
                    result,
                }))
            }
            Err(err) => {
                self.rollback(explicit).await;
                let Some(classified) = classify(&err) else {
                    return Err(err);
                };
                self.options.reporter.statement_failed(&sql, &classified);
                error!(
                    index,
                    class = ?classified.class,
                    severity = ?classified.severity,
                    message = %classified.message,
                    "statement failed"
                );
                if self.options.raise_errors {
                    return Err(err);
                }
                Ok(ExecutionOutcome::Failed(StatementFailure {
                    index,
                    sql,
                    class: classified.class,
                    severity: classified.severity,
                    message: classified.message,
                    error: err,
                }))
            }
        }
    }

    /// Open the statement transaction; `false` means the statement runs without one.
    async fn begin(&mut self) -> Result<bool, SqlRunnerError> {
        if !self.capabilities.can_begin_transaction {
            return Ok(false);
        }
        match self.conn.begin_statement().await {
            Ok(()) => Ok(true),
            Err(SqlRunnerError::InvalidRequest(reason)) => {
                debug!(%reason, "running without a statement transaction");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn commit(&mut self, explicit: bool) -> Result<(), SqlRunnerError> {
        if explicit || (self.capabilities.can_commit && self.conn.in_transaction()) {
            self.conn.commit().await
        } else {
            Ok(())
        }
    }

    async fn rollback(&mut self, explicit: bool) {
        if explicit || (self.capabilities.can_rollback && self.conn.in_transaction()) {
            if let Err(err) = self.conn.rollback().await {
                warn!(error = %err, "rollback failed");
            }
        }
    }
}

async fn execute(
    conn: &MiddlewarePoolConnection,
    sql: &str,
    path: ExecutionPath,
    driver: Option<&DriverParams>,
) -> Result<crate::results::ResultSet, SqlRunnerError> {
    let cursor = conn.cursor();
    match path {
        ExecutionPath::DriverLevel => cursor.exec_driver_sql(sql, driver).await,
        ExecutionPath::Portable => cursor.execute_text(sql, driver).await,
    }
}

/// Produce the SQL text of `statement`, substituting pre-bind fragments when present.
fn render_statement(
    statement: Statement,
    prebind: Option<&PreBindParams>,
    dialect: DatabaseType,
) -> Result<String, SqlRunnerError> {
    let fragment = match (statement, prebind) {
        (Statement::Text(text), None) => return Ok(text),
        (Statement::Text(text), Some(args)) => Fragment::Sql(text).format(args)?,
        (Statement::Fragment(fragment), Some(args)) => fragment.format(args)?,
        (Statement::Fragment(fragment), None) => fragment,
    };
    fragment.as_string(dialect)
}

fn source_file_name(input: &SqlInput, interpret_as_file: Option<bool>) -> Option<String> {
    let path = match input {
        SqlInput::Path(path) => path.as_path(),
        SqlInput::Text(text) if !text.is_empty() => {
            let as_file = interpret_as_file
                .unwrap_or_else(|| classify_text_input(text) == TextInputKind::File);
            if !as_file {
                return None;
            }
            Path::new(text)
        }
        _ => return None,
    };
    Some(
        path.file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned()),
    )
}

/// Split `input` and prepare a lazy run against `connectable`.
///
/// Nothing executes until [`QueryStream::next`] is called. Input is read and split, and the
/// parameter shape checked, before a connection is checked out.
///
/// # Errors
/// Returns `SqlRunnerError::Io` for unreadable input, `SqlRunnerError::ParameterShapeError`
/// when per-statement parameters don't match the statement count, or the pool's error.
pub async fn run_queries_stream<'a>(
    connectable: impl Into<Connectable<'a>>,
    input: impl Into<SqlInput>,
    params: impl Into<Params>,
    options: RunOptions,
) -> Result<QueryStream<'a>, SqlRunnerError> {
    let input = input.into();
    let params = params.into();
    if let Some(name) = source_file_name(&input, options.interpret_as_file) {
        options.reporter.file(&name);
    }
    let statements = split_input(input, options.interpret_as_file)?.unwrap_or_default();
    params.check_shape(statements.len())?;
    debug!(statements = statements.len(), "prepared run");

    let (conn, capabilities) = resolve_connection(connectable.into()).await?;
    Ok(QueryStream {
        conn,
        capabilities,
        statements: statements.into_iter().enumerate(),
        params,
        options,
        finished: false,
    })
}

/// Run every statement in `input` and collect the outcomes.
///
/// # Errors
/// See [`run_queries_stream`]; also returns the first unclassified error, or the first
/// classified one when `raise_errors` is set.
pub async fn run_queries<'a>(
    connectable: impl Into<Connectable<'a>>,
    input: impl Into<SqlInput>,
    params: impl Into<Params>,
    options: RunOptions,
) -> Result<Vec<ExecutionOutcome>, SqlRunnerError> {
    run_queries_stream(connectable, input, params, options)
        .await?
        .collect()
        .await
}

/// Run `input`, collecting the outcomes or returning the lazy stream per
/// [`RunOptions::yield_results`].
///
/// # Errors
/// See [`run_queries`].
pub async fn run_sql<'a>(
    connectable: impl Into<Connectable<'a>>,
    input: impl Into<SqlInput>,
    params: impl Into<Params>,
    options: RunOptions,
) -> Result<RunResults<'a>, SqlRunnerError> {
    let yield_results = options.yield_results;
    let stream = run_queries_stream(connectable, input, params, options).await?;
    if yield_results {
        Ok(RunResults::Streaming(stream))
    } else {
        Ok(RunResults::Collected(stream.collect().await?))
    }
}

/// Run the statements in the file at `path`.
///
/// # Errors
/// See [`run_sql`].
pub async fn run_query_file<'a>(
    connectable: impl Into<Connectable<'a>>,
    path: impl AsRef<Path>,
    params: impl Into<Params>,
    options: RunOptions,
) -> Result<RunResults<'a>, SqlRunnerError> {
    let options = options.with_interpret_as_file(Some(true));
    run_sql(
        connectable,
        SqlInput::Path(path.as_ref().to_path_buf()),
        params,
        options,
    )
    .await
}

/// Run one statement in its own transaction on `conn`, then release the connection.
///
/// Programming and integrity errors are rolled back and reported. They come back as
/// `Ok(Some(ExecutionOutcome::Failed(..)))`, or as `Err` when `stop_on_error` is set.
/// Returns `Ok(None)` when there is nothing to run.
///
/// # Errors
/// Returns classified errors when `stop_on_error` is set, and every other error as is.
pub async fn run_single(
    conn: MiddlewarePoolConnection,
    sql: &str,
    params: Option<ParamSet>,
    stop_on_error: bool,
) -> Result<Option<ExecutionOutcome>, SqlRunnerError> {
    run_single_with_reporter(conn, sql, params, stop_on_error, &Reporter::default()).await
}

/// [`run_single`] with an explicit reporter.
///
/// # Errors
/// See [`run_single`].
pub async fn run_single_with_reporter(
    mut conn: MiddlewarePoolConnection,
    sql: &str,
    params: Option<ParamSet>,
    stop_on_error: bool,
    reporter: &Reporter,
) -> Result<Option<ExecutionOutcome>, SqlRunnerError> {
    let (driver, prebind) = partition(params.as_ref());
    let rendered = render_statement(
        Statement::Text(sql.to_string()),
        prebind.as_ref(),
        conn.database_type(),
    )?;
    let sql = strip_comments(&rendered).trim().to_string();
    if sql.is_empty() {
        return Ok(None);
    }

    conn.begin_statement().await?;
    let executed = match conn.cursor().execute_text(&sql, driver.as_ref()).await {
        Ok(result) => conn.commit().await.map(|()| result),
        Err(err) => Err(err),
    };

    let outcome = match executed {
        Ok(result) => {
            reporter.statement_ok(&sql);
            ExecutionOutcome::Success(StatementSuccess {
                index: 0,
                sql,
                path: ExecutionPath::Portable,
                result,
            })
        }
        Err(err) => {
            if let Err(rollback_err) = conn.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            let classified = classify(&err)
                .filter(|c| matches!(c.class, ErrorClass::Programming | ErrorClass::Integrity));
            let Some(classified) = classified else {
                return Err(err);
            };
            reporter.statement_failed(&sql, &classified);
            error!(
                class = ?classified.class,
                message = %classified.message,
                "statement failed"
            );
            if stop_on_error {
                return Err(err);
            }
            ExecutionOutcome::Failed(StatementFailure {
                index: 0,
                sql,
                class: classified.class,
                severity: classified.severity,
                message: classified.message,
                error: err,
            })
        }
    };
    drop(conn);
    Ok(Some(outcome))
}
