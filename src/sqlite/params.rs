use rusqlite::types::Value;

use crate::types::RowValues;

/// Convert a single `RowValues` to a `rusqlite` value.
///
/// Booleans become 0/1, timestamps ISO-8601 text and JSON its serialized text.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Owned `SQLite` parameter list, ready to move onto the blocking pool.
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[RowValues]) -> Self {
        Params(params.iter().map(row_value_to_sqlite_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_scalars() {
        let params = Params::convert(&[
            RowValues::Bool(true),
            RowValues::Null,
            RowValues::JSON(serde_json::json!({"a": 1})),
        ]);
        assert_eq!(
            params.0,
            vec![
                Value::Integer(1),
                Value::Null,
                Value::Text(r#"{"a":1}"#.into())
            ]
        );
    }
}
