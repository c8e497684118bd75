use tracing::warn;

use crate::report::Reporter;

/// Per-run behaviour.
///
/// ```rust
/// use sql_runner::prelude::*;
///
/// let options = RunOptions::new()
///     .with_raise_errors(true)
///     .with_has_server_binds(Some(false))
///     .with_reporter(Reporter::silent());
/// assert!(options.raise_errors);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Re-raise classified errors after rollback and reporting instead of continuing.
    pub raise_errors: bool,
    /// Force the driver-level (`Some(true)`) or portable (`Some(false)`) bind path; `None`
    /// inspects each statement.
    pub has_server_binds: Option<bool>,
    /// Force text input to be read as a file path (`Some(true)`) or as SQL (`Some(false)`).
    pub interpret_as_file: Option<bool>,
    /// Hand back a lazy stream from `run_sql` instead of running everything up front.
    pub yield_results: bool,
    pub reporter: Reporter,
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_raise_errors(mut self, raise_errors: bool) -> Self {
        self.raise_errors = raise_errors;
        self
    }

    /// Old name for [`RunOptions::with_raise_errors`]; only ever turns re-raising on.
    #[deprecated(note = "use `with_raise_errors`")]
    #[must_use]
    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        if stop_on_error {
            warn!("stop_on_error is deprecated, use raise_errors");
            self.raise_errors = true;
        }
        self
    }

    #[must_use]
    pub fn with_has_server_binds(mut self, has_server_binds: Option<bool>) -> Self {
        self.has_server_binds = has_server_binds;
        self
    }

    #[must_use]
    pub fn with_interpret_as_file(mut self, interpret_as_file: Option<bool>) -> Self {
        self.interpret_as_file = interpret_as_file;
        self
    }

    #[must_use]
    pub fn with_yield_results(mut self, yield_results: bool) -> Self {
        self.yield_results = yield_results;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(deprecated)]
    fn stop_on_error_implies_raise_errors() {
        assert!(RunOptions::new().with_stop_on_error(true).raise_errors);
        assert!(!RunOptions::new().with_stop_on_error(false).raise_errors);
        assert!(
            RunOptions::new()
                .with_raise_errors(true)
                .with_stop_on_error(false)
                .raise_errors
        );
    }
}
