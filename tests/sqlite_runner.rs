#![cfg(feature = "sqlite")]

use std::io::Write;
use std::path::Path;

use sql_runner::prelude::*;
use tokio::runtime::Runtime;

async fn engine(dir: &Path) -> Result<ConfigAndPool, SqlRunnerError> {
    let path = dir.join("runner.db");
    ConfigAndPool::sqlite_builder(path.to_string_lossy().into_owned())
        .build()
        .await
}

async fn count(engine: &ConfigAndPool, table: &str) -> Result<i64, SqlRunnerError> {
    let outcomes = run_queries(
        engine,
        format!("SELECT COUNT(*) AS n FROM {table}"),
        Params::None,
        RunOptions::new().with_reporter(Reporter::silent()),
    )
    .await?;
    let rows = outcomes[0].result().map_or(0, |rs| {
        rs.results[0]
            .get("n")
            .and_then(RowValues::as_int)
            .copied()
            .unwrap_or_default()
    });
    Ok(rows)
}

fn quiet() -> RunOptions {
    RunOptions::new().with_reporter(Reporter::silent())
}

#[test]
fn each_statement_yields_its_rows() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let outcomes = run_queries(&engine, "SELECT 1; SELECT 2;", Params::None, quiet()).await?;
        assert_eq!(outcomes.len(), 2);
        for (expected, outcome) in [1i64, 2].iter().zip(&outcomes) {
            let rs = outcome.result().expect("success");
            assert_eq!(rs.results.len(), 1);
            assert_eq!(rs.results[0].get_by_index(0).and_then(RowValues::as_int), Some(expected));
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn driver_level_inserts_take_per_statement_params() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let outcomes = run_queries(
            &engine,
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO t (id, name) VALUES (%s, %s);
             INSERT INTO t (id, name) VALUES (:id, :name);
             SELECT name FROM t ORDER BY id;",
            Params::PerStatement(vec![
                None,
                Some(ParamSet::positional([Param::from(1), Param::from("one")])),
                Some(ParamSet::named([
                    ("id", Param::from(2)),
                    ("name", Param::from("two")),
                ])),
                None,
            ]),
            quiet(),
        )
        .await?;

        let paths: Vec<_> = outcomes
            .iter()
            .map(|o| match o {
                ExecutionOutcome::Success(s) => Some(s.path),
                _ => None,
            })
            .collect();
        assert_eq!(
            paths,
            vec![
                Some(ExecutionPath::Portable),
                Some(ExecutionPath::DriverLevel),
                Some(ExecutionPath::Portable),
                Some(ExecutionPath::Portable),
            ]
        );
        let names: Vec<_> = outcomes[3]
            .result()
            .expect("select")
            .results
            .iter()
            .filter_map(|row| row.get("name").and_then(RowValues::as_text).map(str::to_owned))
            .collect();
        assert_eq!(names, vec!["one", "two"]);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn literal_percent_survives_without_params() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let outcomes = run_queries(&engine, "SELECT 'a%' AS v", Params::None, quiet()).await?;
        let rs = outcomes[0].result().expect("select");
        assert_eq!(rs.results[0].get("v").and_then(RowValues::as_text), Some("a%"));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn prebind_fragments_render_into_text() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        run_queries(
            &engine,
            "CREATE TABLE \"odd name\" (id INTEGER); INSERT INTO \"odd name\" VALUES (7);",
            Params::None,
            quiet(),
        )
        .await?;

        let outcomes = run_queries(
            &engine,
            "SELECT COUNT(*) AS n FROM {table} WHERE id = :id",
            ParamSet::named([
                ("table", Param::from(Fragment::identifier(["odd name"]))),
                ("id", Param::from(7)),
            ]),
            quiet(),
        )
        .await?;
        let rs = outcomes[0].result().expect("select");
        assert_eq!(rs.results[0].get("n").and_then(RowValues::as_int), Some(&1));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn file_input_echoes_the_file_name() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let script = dir.path().join("schema.sql");
    let mut file = std::fs::File::create(&script)?;
    writeln!(file, "-- schema\nCREATE TABLE t (id INTEGER);\nINSERT INTO t VALUES (1);")?;
    drop(file);

    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let (reporter, lines) = Reporter::capture();
        let results = run_query_file(
            &engine,
            &script,
            Params::None,
            RunOptions::new().with_reporter(reporter),
        )
        .await?;
        let outcomes = results.into_outcomes().await?;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(ExecutionOutcome::is_success));

        let lines = lines.lock().expect("capture").clone();
        assert_eq!(
            lines[0],
            ReportLine {
                text: "schema.sql".into(),
                style: LineStyle::CyanBold
            }
        );
        assert_eq!(lines[1].text, "CREATE TABLE t");
        assert_eq!(lines[2].text, "INSERT INTO t VALUES");
        assert_eq!(count(&engine, "t").await?, 1);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn integrity_failure_rolls_back_and_continues() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let (reporter, lines) = Reporter::capture();
        let outcomes = run_queries(
            &engine,
            "CREATE TABLE t (id INTEGER PRIMARY KEY);
             INSERT INTO t VALUES (1);
             INSERT INTO t VALUES (1);
             INSERT INTO t VALUES (2);",
            Params::None,
            RunOptions::new().with_reporter(reporter),
        )
        .await?;

        let flags: Vec<_> = outcomes.iter().map(ExecutionOutcome::is_success).collect();
        assert_eq!(flags, vec![true, true, false, true]);
        let failure = outcomes[2].failure().expect("duplicate key");
        assert_eq!(failure.class, ErrorClass::Integrity);
        assert_eq!(failure.severity, Severity::Hard);
        assert!(failure.message.contains("UNIQUE"));

        let lines = lines.lock().expect("capture").clone();
        assert!(lines.iter().any(|l| l.style == LineStyle::Red && l.text.contains("UNIQUE")));
        assert_eq!(count(&engine, "t").await?, 2);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn benign_failure_is_reraised_when_asked() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        run_queries(&engine, "CREATE TABLE t (id INTEGER)", Params::None, quiet()).await?;

        let (reporter, lines) = Reporter::capture();
        let err = run_queries(
            &engine,
            "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1);",
            Params::None,
            RunOptions::new()
                .with_raise_errors(true)
                .with_reporter(reporter),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SqlRunnerError::SqliteError(_)));

        let lines = lines.lock().expect("capture").clone();
        assert_eq!(
            lines,
            vec![
                ReportLine {
                    text: "CREATE TABLE t".into(),
                    style: LineStyle::Dim
                },
                ReportLine {
                    text: "  table t already exists".into(),
                    style: LineStyle::RedDim
                },
            ]
        );
        assert_eq!(count(&engine, "t").await?, 0);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn benign_failure_is_recorded_without_raise() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let sql = "CREATE TABLE t (id INTEGER); CREATE TABLE t (id INTEGER);";
        let outcomes = run_queries(&engine, sql, Params::None, quiet()).await?;
        let failure = outcomes[1].failure().expect("second create fails");
        assert_eq!(failure.class, ErrorClass::Programming);
        assert_eq!(failure.severity, Severity::Benign);

        let idempotent = "CREATE TABLE IF NOT EXISTS u (id INTEGER);";
        for _ in 0..2 {
            let outcomes = run_queries(&engine, idempotent, Params::None, quiet()).await?;
            assert!(outcomes[0].is_success());
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn comment_only_statements_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let outcomes = run_queries(
            &engine,
            "SELECT 1; -- nothing here\n; /* nor here */; SELECT 2",
            Params::None,
            quiet(),
        )
        .await?;
        let skipped: Vec<_> = outcomes.iter().map(ExecutionOutcome::is_skipped).collect();
        assert_eq!(skipped, vec![false, true, true, false]);
        assert_eq!(outcomes[3].index(), 3);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn shape_mismatch_fails_before_anything_runs() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let err = run_queries(
            &engine,
            "CREATE TABLE a (x INTEGER); CREATE TABLE b (x INTEGER);",
            vec![ParamSet::positional([1])],
            quiet(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            SqlRunnerError::ParameterShapeError {
                statements: 2,
                parameter_sets: 1
            }
        ));
        assert_eq!(count(&engine, "sqlite_master").await?, 0);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn unclassified_errors_propagate() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let err = run_queries(
            &engine,
            "SELECT %s, %s",
            ParamSet::positional([1]),
            quiet(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SqlRunnerError::ParameterError(_)));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn caller_transaction_is_committed_by_the_run() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        run_queries(&engine, "CREATE TABLE t (id INTEGER)", Params::None, quiet()).await?;

        let mut conn = engine.get_connection().await?;
        conn.begin().await?;
        assert_eq!(conn.tx_state(), TxState::Caller);
        let outcomes = run_queries(
            &mut conn,
            "INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);",
            Params::None,
            quiet(),
        )
        .await?;
        assert!(outcomes.iter().all(ExecutionOutcome::is_success));
        assert!(!conn.in_transaction());
        drop(conn);

        assert_eq!(count(&engine, "t").await?, 2);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn autocommit_connection_runs_without_transactions() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let mut conn = engine.get_connection().await?;
        let outcomes = run_queries(
            Connectable::Autocommit(&mut conn),
            "CREATE TABLE t (id INTEGER PRIMARY KEY);
             INSERT INTO t VALUES (1);
             INSERT INTO t VALUES (1);
             INSERT INTO t VALUES (2);",
            Params::None,
            quiet(),
        )
        .await?;
        assert!(outcomes[2].is_failed());
        assert_eq!(conn.tx_state(), TxState::Idle);
        drop(conn);

        assert_eq!(count(&engine, "t").await?, 2);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn stream_runs_only_what_is_pulled() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let results = run_sql(
            &engine,
            "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);",
            Params::None,
            quiet().with_yield_results(true),
        )
        .await?;
        let RunResults::Streaming(mut stream) = results else {
            panic!("expected a stream");
        };
        assert_eq!(stream.remaining(), 3);
        assert!(stream.next().await.transpose()?.is_some_and(|o| o.is_success()));
        assert!(stream.next().await.transpose()?.is_some_and(|o| o.is_success()));
        assert_eq!(stream.remaining(), 1);
        drop(stream);

        assert_eq!(count(&engine, "t").await?, 1);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn stream_ends_after_a_raised_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let mut stream = run_queries_stream(
            &engine,
            "SELECT * FROM missing; SELECT 1;",
            Params::None,
            quiet().with_raise_errors(true),
        )
        .await?;
        assert!(matches!(stream.next().await, Some(Err(_))));
        assert!(stream.next().await.is_none());
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn single_statement_runs_in_its_own_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        run_queries(
            &engine,
            "CREATE TABLE t (id INTEGER PRIMARY KEY)",
            Params::None,
            quiet(),
        )
        .await?;

        let insert = "INSERT INTO t VALUES (:id)";
        let id = || Some(ParamSet::named([("id", 1)]));
        let silent = Reporter::silent();

        let outcome =
            run_single_with_reporter(engine.get_connection().await?, insert, id(), false, &silent)
                .await?;
        assert!(outcome.is_some_and(|o| o.is_success()));

        let outcome =
            run_single_with_reporter(engine.get_connection().await?, insert, id(), false, &silent)
                .await?;
        assert!(outcome.is_some_and(|o| o.is_failed()));

        let err =
            run_single_with_reporter(engine.get_connection().await?, insert, id(), true, &silent)
                .await
                .unwrap_err();
        assert!(matches!(err, SqlRunnerError::SqliteError(_)));

        let nothing = run_single_with_reporter(
            engine.get_connection().await?,
            "-- only a comment",
            None,
            true,
            &silent,
        )
        .await?;
        assert!(nothing.is_none());

        assert_eq!(count(&engine, "t").await?, 1);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn list_input_runs_each_item_with_its_params() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        run_queries(&engine, "CREATE TABLE t (id INTEGER)", Params::None, quiet()).await?;

        let outcomes = run_queries(
            &engine,
            vec!["INSERT INTO t VALUES (%s)", "INSERT INTO t VALUES (%s)"],
            vec![ParamSet::positional([1]), ParamSet::positional([2])],
            quiet(),
        )
        .await?;
        assert_eq!(outcomes.len(), 2);
        for outcome in &outcomes {
            let ExecutionOutcome::Success(success) = outcome else {
                panic!("expected success, got {outcome:?}");
            };
            assert_eq!(success.path, ExecutionPath::DriverLevel);
            assert_eq!(success.result.rows_affected, 1);
        }
        assert_eq!(count(&engine, "t").await?, 2);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn text_forced_to_a_file_path_is_read() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let script = dir.path().join("seed");
    std::fs::write(&script, "CREATE TABLE t (id INTEGER);\nINSERT INTO t VALUES (1);\n")?;

    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let outcomes = run_queries(
            &engine,
            script.to_string_lossy().into_owned(),
            Params::None,
            quiet().with_interpret_as_file(Some(true)),
        )
        .await?;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(count(&engine, "t").await?, 1);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn begin_column_keeps_statements_apart() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let outcomes = run_queries(
            &engine,
            "CREATE TABLE spans (id INTEGER, begin TEXT, finish TEXT);
             INSERT INTO spans VALUES (1, 'a', 'b');
             SELECT 1;",
            Params::None,
            quiet(),
        )
        .await?;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(ExecutionOutcome::is_success));
        assert_eq!(count(&engine, "spans").await?, 1);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn cursor_is_debug_printable() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let engine = engine(dir.path()).await?;
        let conn = engine.get_connection().await?;
        let cursor = conn.cursor();
        assert_eq!(format!("{cursor:?}"), "Cursor::Sqlite");
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
