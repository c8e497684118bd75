mod args;
mod logging;

use clap::Parser;
use serde::Serialize;
use sql_runner::prelude::*;
use sql_runner::split_input;
use tracing::Level;

use crate::args::{Args, BackendKind};
use crate::logging::LogWriter;

#[derive(Debug, Serialize)]
struct StatementSummary<'a> {
    index: usize,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ResultSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<ErrorClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

impl<'a> From<&'a ExecutionOutcome> for StatementSummary<'a> {
    fn from(outcome: &'a ExecutionOutcome) -> Self {
        let mut summary = StatementSummary {
            index: outcome.index(),
            status: "skipped",
            sql: None,
            result: None,
            class: None,
            severity: None,
            message: None,
        };
        match outcome {
            ExecutionOutcome::Success(success) => {
                summary.status = "ok";
                summary.sql = Some(&success.sql);
                summary.result = Some(&success.result);
            }
            ExecutionOutcome::Failed(failure) => {
                summary.status = "failed";
                summary.sql = Some(&failure.sql);
                summary.class = Some(failure.class);
                summary.severity = Some(failure.severity);
                summary.message = Some(&failure.message);
            }
            ExecutionOutcome::Skipped { .. } => {}
        }
        summary
    }
}

fn input_of(args: &Args) -> SqlInput {
    match (&args.file, &args.sql) {
        (Some(path), _) => SqlInput::from(path.clone()),
        (None, Some(sql)) => SqlInput::from(sql.clone()),
        (None, None) => SqlInput::from(""),
    }
}

async fn connect(args: &Args) -> Result<ConfigAndPool, SqlRunnerError> {
    match args.backend {
        #[cfg(feature = "sqlite")]
        BackendKind::Sqlite => {
            ConfigAndPool::sqlite_builder(args.database.clone())
                .build()
                .await
        }
        #[cfg(feature = "postgres")]
        BackendKind::Postgres => {
            let mut builder = ConfigAndPool::postgres_builder()
                .host(args.host.clone())
                .port(args.port);
            if let Some(user) = &args.user {
                builder = builder.user(user.clone());
            }
            if let Some(password) = &args.password {
                builder = builder.password(password.clone());
            }
            if let Some(dbname) = &args.dbname {
                builder = builder.dbname(dbname.clone());
            }
            builder.build().await
        }
        #[allow(unreachable_patterns)]
        other => Err(SqlRunnerError::ConfigError(format!(
            "backend {other:?} is not compiled in"
        ))),
    }
}

async fn run(args: Args) -> Result<(), SqlRunnerError> {
    let input = input_of(&args);

    if args.dry_run {
        let statements = split_input(input, None)?.unwrap_or_default();
        for (index, statement) in statements.iter().enumerate() {
            println!("-- [{index}]\n{};", statement.display_text());
        }
        return Ok(());
    }

    let reporter = if args.json {
        Reporter::new(ReportSink::Stderr)
    } else {
        Reporter::default()
    };
    let options = RunOptions::new()
        .with_raise_errors(args.raise_errors)
        .with_has_server_binds(args.server_binds)
        .with_reporter(reporter);

    let engine = connect(&args).await?;
    let outcomes = run_queries(&engine, input, Params::None, options).await?;

    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    let skipped = outcomes.iter().filter(|o| o.is_skipped()).count();
    tracing::info!(
        statements = outcomes.len(),
        failed,
        skipped,
        "run finished"
    );

    if args.json {
        let summary: Vec<StatementSummary<'_>> = outcomes.iter().map(Into::into).collect();
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|err| SqlRunnerError::Other(err.to_string()))?;
        println!("{json}");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }
    let writer = LogWriter::new(args.log.clone()).unwrap_or_else(|err| {
        eprintln!("failed to open log file: {err}");
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_ansi(!args.no_color)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    if let Err(err) = run(args).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
