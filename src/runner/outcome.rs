use serde::Serialize;

use crate::classify::{ErrorClass, Severity};
use crate::error::SqlRunnerError;
use crate::results::ResultSet;

/// How a statement's parameters reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionPath {
    /// `%s` / `%(name)s` placeholders bound by the driver.
    DriverLevel,
    /// `:name` binds or backend positional placeholders.
    Portable,
}

#[derive(Debug)]
pub struct StatementSuccess {
    pub index: usize,
    /// The SQL as sent, after rendering and comment stripping.
    pub sql: String,
    pub path: ExecutionPath,
    pub result: ResultSet,
}

/// A classified failure the run recovered from.
#[derive(Debug)]
pub struct StatementFailure {
    pub index: usize,
    pub sql: String,
    pub class: ErrorClass,
    pub severity: Severity,
    /// The backend's own message.
    pub message: String,
    pub error: SqlRunnerError,
}

/// What happened to one statement.
#[derive(Debug)]
pub enum ExecutionOutcome {
    Success(StatementSuccess),
    /// Nothing left to run once comments were stripped.
    Skipped { index: usize },
    Failed(StatementFailure),
}

impl ExecutionOutcome {
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            ExecutionOutcome::Success(success) => success.index,
            ExecutionOutcome::Skipped { index } => *index,
            ExecutionOutcome::Failed(failure) => failure.index,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, ExecutionOutcome::Skipped { .. })
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, ExecutionOutcome::Failed(_))
    }

    #[must_use]
    pub fn result(&self) -> Option<&ResultSet> {
        match self {
            ExecutionOutcome::Success(success) => Some(&success.result),
            _ => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&StatementFailure> {
        match self {
            ExecutionOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}
