use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio_postgres::types::{FromSql, Kind, Type};
use tokio_postgres::{Client, Statement};
use tracing::warn;

use crate::error::SqlRunnerError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::numeric::{decode_numeric, decode_uuid};
use super::params::Params;

/// Column value as the server sent it, for types with no dedicated decoder.
struct RawBytes<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawBytes<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawBytes(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn raw_value(
    row: &tokio_postgres::Row,
    idx: usize,
    decode: impl FnOnce(&[u8]) -> Option<String>,
) -> Result<RowValues, SqlRunnerError> {
    let raw: Option<RawBytes> = row.try_get(idx)?;
    let Some(RawBytes(bytes)) = raw else {
        return Ok(RowValues::Null);
    };
    decode(bytes).map(RowValues::Text).ok_or_else(|| {
        SqlRunnerError::ExecutionError(format!(
            "malformed {} value in column {}",
            row.columns()[idx].type_().name(),
            row.columns()[idx].name()
        ))
    })
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns `SqlRunnerError` if the column cannot be retrieved.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<RowValues, SqlRunnerError> {
    let type_info = row.columns()[idx].type_();

    Ok(match type_info.name() {
        "int2" => {
            let val: Option<i16> = row.try_get(idx)?;
            val.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v)))
        }
        "int4" => {
            let val: Option<i32> = row.try_get(idx)?;
            val.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v)))
        }
        "int8" => {
            let val: Option<i64> = row.try_get(idx)?;
            val.map_or(RowValues::Null, RowValues::Int)
        }
        "float4" => {
            let val: Option<f32> = row.try_get(idx)?;
            val.map_or(RowValues::Null, |v| RowValues::Float(f64::from(v)))
        }
        "float8" => {
            let val: Option<f64> = row.try_get(idx)?;
            val.map_or(RowValues::Null, RowValues::Float)
        }
        "bool" => {
            let val: Option<bool> = row.try_get(idx)?;
            val.map_or(RowValues::Null, RowValues::Bool)
        }
        "timestamp" => {
            let val: Option<NaiveDateTime> = row.try_get(idx)?;
            val.map_or(RowValues::Null, RowValues::Timestamp)
        }
        "timestamptz" => {
            let val: Option<DateTime<Utc>> = row.try_get(idx)?;
            val.map_or(RowValues::Null, |v| RowValues::Timestamp(v.naive_utc()))
        }
        "date" => {
            let val: Option<NaiveDate> = row.try_get(idx)?;
            val.and_then(|d| d.and_hms_opt(0, 0, 0))
                .map_or(RowValues::Null, RowValues::Timestamp)
        }
        "json" | "jsonb" => {
            let val: Option<Value> = row.try_get(idx)?;
            val.map_or(RowValues::Null, RowValues::JSON)
        }
        "bytea" => {
            let val: Option<Vec<u8>> = row.try_get(idx)?;
            val.map_or(RowValues::Null, RowValues::Blob)
        }
        "numeric" => raw_value(row, idx, decode_numeric)?,
        "uuid" => raw_value(row, idx, decode_uuid)?,
        _ if <String as FromSql>::accepts(type_info) => {
            let val: Option<String> = row.try_get(idx)?;
            val.map_or(RowValues::Null, RowValues::Text)
        }
        _ if matches!(type_info.kind(), Kind::Enum(_)) => raw_value(row, idx, |bytes| {
            std::str::from_utf8(bytes).ok().map(str::to_owned)
        })?,
        _ => {
            // binary layouts with no decoder here (interval, arrays, ranges, ...)
            warn!(
                column = row.columns()[idx].name(),
                pg_type = type_info.name(),
                "no decoder for column type; reporting NULL"
            );
            RowValues::Null
        }
    })
}

/// Build a result set using statement metadata for column names.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_result_set_from_statement(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, SqlRunnerError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(column_names));

    for row in rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Prepare and run one statement with positional `$N` parameters.
///
/// # Errors
/// Returns `SqlRunnerError::PostgresError` from prepare or execution.
pub async fn execute_statement(
    client: &Client,
    sql: &str,
    params: &[RowValues],
) -> Result<ResultSet, SqlRunnerError> {
    let stmt = client.prepare(sql).await?;
    let converted = Params::convert(params);
    if stmt.columns().is_empty() {
        let affected = client.execute(&stmt, converted.as_refs()).await?;
        let affected = usize::try_from(affected).map_err(|e| {
            SqlRunnerError::ExecutionError(format!("postgres affected rows conversion error: {e}"))
        })?;
        Ok(ResultSet::affected(affected))
    } else {
        let rows = client.query(&stmt, converted.as_refs()).await?;
        build_result_set_from_statement(&stmt, &rows)
    }
}
