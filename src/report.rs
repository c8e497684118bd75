//! Console echo of executed statements and their failures.

use std::io::Write;
use std::sync::{Arc, Mutex};

use colored::Colorize;

use crate::classify::{Classified, Severity};

const HEAD_KEYWORDS: [&str; 7] = [
    "SELECT", "INSERT", "UPDATE", "CREATE", "DROP", "DELETE", "ALTER",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Dim,
    Red,
    RedDim,
    CyanBold,
}

/// One line of console output, kept unstyled so captures can be inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub text: String,
    pub style: LineStyle,
}

impl ReportLine {
    fn render(&self) -> String {
        match self.style {
            LineStyle::Dim => self.text.dimmed().to_string(),
            LineStyle::Red => self.text.red().to_string(),
            LineStyle::RedDim => self.text.red().dimmed().to_string(),
            LineStyle::CyanBold => self.text.cyan().bold().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum ReportSink {
    #[default]
    Stdout,
    Stderr,
    Silent,
    Capture(Arc<Mutex<Vec<ReportLine>>>),
}

/// Writes statement heads and error messages to the configured sink.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    sink: ReportSink,
}

impl Reporter {
    #[must_use]
    pub fn new(sink: ReportSink) -> Self {
        Self { sink }
    }

    #[must_use]
    pub fn silent() -> Self {
        Self::new(ReportSink::Silent)
    }

    /// A reporter that records lines in memory, plus the handle to read them back.
    #[must_use]
    pub fn capture() -> (Self, Arc<Mutex<Vec<ReportLine>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        (Self::new(ReportSink::Capture(Arc::clone(&lines))), lines)
    }

    pub fn file(&self, name: &str) {
        self.emit(ReportLine {
            text: name.to_string(),
            style: LineStyle::CyanBold,
        });
    }

    pub fn statement_ok(&self, sql: &str) {
        if let Some(head) = statement_head(sql) {
            self.emit(ReportLine {
                text: head,
                style: LineStyle::Dim,
            });
        }
    }

    /// Echo the failed statement's head, then the backend message.
    pub fn statement_failed(&self, sql: &str, classified: &Classified) {
        let benign = classified.severity == Severity::Benign;
        if let Some(head) = statement_head(sql) {
            self.emit(ReportLine {
                text: head,
                style: if benign {
                    LineStyle::Dim
                } else {
                    LineStyle::RedDim
                },
            });
        }
        let line = if benign {
            ReportLine {
                text: format!("  {}", classified.message),
                style: LineStyle::RedDim,
            }
        } else {
            ReportLine {
                text: classified.message.clone(),
                style: LineStyle::Red,
            }
        };
        self.emit(line);
    }

    fn emit(&self, line: ReportLine) {
        match &self.sink {
            ReportSink::Stdout => {
                let _ = writeln!(std::io::stdout(), "{}", line.render());
            }
            ReportSink::Stderr => {
                let _ = writeln!(std::io::stderr(), "{}", line.render());
            }
            ReportSink::Silent => {}
            ReportSink::Capture(lines) => {
                let mut guard = match lines.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                guard.push(line);
            }
        }
    }
}

/// A short label for `sql`: the first line that starts with a statement keyword, cut before
/// any `(`, with trailing `;` and ` AS` removed.
#[must_use]
pub fn statement_head(sql: &str) -> Option<String> {
    sql.split('\n')
        .find(|line| HEAD_KEYWORDS.iter().any(|kw| line.starts_with(kw)))
        .map(|line| {
            line.split('(')
                .next()
                .unwrap_or_default()
                .trim()
                .trim_end_matches(';')
                .replace(" AS", "")
        })
}
