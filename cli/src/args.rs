use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub(crate) enum BackendKind {
    Sqlite,
    Postgres,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run SQL scripts one statement per transaction")]
pub(crate) struct Args {
    /// SQL text, or the path of a file holding SQL
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub(crate) sql: Option<String>,
    /// Read statements from this file
    #[arg(long, short)]
    pub(crate) file: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "sqlite")]
    pub(crate) backend: BackendKind,
    /// SQLite database path
    #[arg(long, default_value = ":memory:")]
    pub(crate) database: String,
    #[arg(long, default_value = "localhost")]
    pub(crate) host: String,
    #[arg(long, default_value_t = 5432)]
    pub(crate) port: u16,
    #[arg(long)]
    pub(crate) user: Option<String>,
    #[arg(long, env = "SQL_RUNNER_PG_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
    #[arg(long)]
    pub(crate) dbname: Option<String>,
    /// Stop at the first failed statement
    #[arg(long)]
    pub(crate) raise_errors: bool,
    /// Force driver-level (`true`) or portable (`false`) binds
    #[arg(long)]
    pub(crate) server_binds: Option<bool>,
    /// Print the split statements without connecting
    #[arg(long)]
    pub(crate) dry_run: bool,
    #[arg(long)]
    pub(crate) no_color: bool,
    /// Also write logs to this file
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    /// Print a JSON summary of every statement
    #[arg(long)]
    pub(crate) json: bool,
    #[arg(long, short)]
    pub(crate) verbose: bool,
}
