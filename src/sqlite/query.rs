use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Statement, params_from_iter};

use crate::error::SqlRunnerError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `SqlRunnerError` if the value cannot be read.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<RowValues, SqlRunnerError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Run a row-returning statement and collect every row.
///
/// # Errors
/// Returns `SqlRunnerError::SqliteError` if the query or row extraction fails.
pub fn build_result_set(stmt: &mut Statement, params: &[Value]) -> Result<ResultSet, SqlRunnerError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    let mut rows_iter = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value_sync(row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Prepare and run one statement: row-returning statements are collected, everything else
/// reports rows changed.
///
/// # Errors
/// Returns `SqlRunnerError::SqliteError` from prepare or execution.
pub fn execute_statement(
    conn: &mut rusqlite::Connection,
    sql: &str,
    params: &[Value],
) -> Result<ResultSet, SqlRunnerError> {
    let mut stmt = conn.prepare(sql)?;
    if stmt.column_count() == 0 {
        let affected = stmt.execute(params_from_iter(params.iter()))?;
        Ok(ResultSet::affected(affected))
    } else {
        build_result_set(&mut stmt, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dml_reports_rows_changed_and_select_collects_rows() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        execute_statement(&mut conn, "CREATE TABLE t (id INTEGER, name TEXT)", &[]).unwrap();
        let inserted = execute_statement(
            &mut conn,
            "INSERT INTO t VALUES (?1, ?2), (?1 + 1, ?2)",
            &[Value::Integer(1), Value::Text("a".into())],
        )
        .unwrap();
        assert_eq!(inserted.rows_affected, 2);
        assert!(inserted.is_empty());

        let rows = execute_statement(&mut conn, "SELECT id, name FROM t ORDER BY id", &[]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.results[1].get("id"), Some(&RowValues::Int(2)));
        assert_eq!(rows.results[0].get("name"), Some(&RowValues::Text("a".into())));
    }
}
