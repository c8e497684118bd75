//! Sorting backend failures into the categories the runner recovers from.

use serde::Serialize;

use crate::error::SqlRunnerError;

/// Backend error categories the runner catches, rolls back, and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    /// Bad SQL or a missing/duplicate object.
    Programming,
    /// A constraint violation.
    Integrity,
    /// The backend's own failure or an invalid transaction state.
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Re-applying something that already exists.
    Benign,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub class: ErrorClass,
    pub severity: Severity,
    /// The backend's own message, without driver decoration.
    pub message: String,
}

/// Whether a backend message describes a harmless re-application.
#[must_use]
pub fn is_benign_message(message: &str) -> bool {
    message.contains("already exists")
}

/// Map a PostgreSQL SQLSTATE to its error class.
#[must_use]
pub fn class_for_sqlstate(code: &str) -> Option<ErrorClass> {
    match code.get(..2)? {
        "23" => Some(ErrorClass::Integrity),
        "42" | "3D" | "3F" | "26" | "2B" | "34" => Some(ErrorClass::Programming),
        "XX" | "25" | "2D" => Some(ErrorClass::Internal),
        _ => None,
    }
}

/// Classify `err`, or `None` when the runner should let it propagate.
#[must_use]
pub fn classify(err: &SqlRunnerError) -> Option<Classified> {
    let (class, message) = match err {
        #[cfg(feature = "sqlite")]
        SqlRunnerError::SqliteError(e) => classify_sqlite(e)?,
        #[cfg(feature = "postgres")]
        SqlRunnerError::PostgresError(e) => classify_postgres(e)?,
        #[cfg(feature = "postgres")]
        SqlRunnerError::PoolErrorPostgres(bb8::RunError::User(e)) => classify_postgres(e)?,
        _ => return None,
    };
    let message = message.trim().to_string();
    let severity = if is_benign_message(&message) {
        Severity::Benign
    } else {
        Severity::Hard
    };
    Some(Classified {
        class,
        severity,
        message,
    })
}

#[cfg(feature = "sqlite")]
fn classify_sqlite(err: &rusqlite::Error) -> Option<(ErrorClass, String)> {
    use rusqlite::ErrorCode;

    let rusqlite::Error::SqliteFailure(failure, message) = err else {
        return None;
    };
    let class = match failure.code {
        ErrorCode::ConstraintViolation => ErrorClass::Integrity,
        ErrorCode::Unknown => ErrorClass::Programming,
        ErrorCode::InternalMalfunction => ErrorClass::Internal,
        _ => return None,
    };
    let message = message.clone().unwrap_or_else(|| failure.to_string());
    Some((class, message))
}

#[cfg(feature = "postgres")]
fn classify_postgres(err: &tokio_postgres::Error) -> Option<(ErrorClass, String)> {
    let db_error = err.as_db_error()?;
    let class = class_for_sqlstate(db_error.code().code())?;
    Some((class, db_error.message().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_classes() {
        assert_eq!(class_for_sqlstate("23505"), Some(ErrorClass::Integrity));
        assert_eq!(class_for_sqlstate("42P07"), Some(ErrorClass::Programming));
        assert_eq!(class_for_sqlstate("3D000"), Some(ErrorClass::Programming));
        assert_eq!(class_for_sqlstate("XX000"), Some(ErrorClass::Internal));
        assert_eq!(class_for_sqlstate("25P02"), Some(ErrorClass::Internal));
        assert_eq!(class_for_sqlstate("08006"), None);
        assert_eq!(class_for_sqlstate("4"), None);
    }

    #[test]
    fn non_backend_errors_are_unclassified() {
        assert!(classify(&SqlRunnerError::ParameterError("x".into())).is_none());
        assert!(classify(&SqlRunnerError::ConnectionError("x".into())).is_none());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_duplicate_table_is_benign_programming_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .unwrap();
        let err = conn
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .unwrap_err();
        let classified = classify(&SqlRunnerError::from(err)).unwrap();
        assert_eq!(classified.class, ErrorClass::Programming);
        assert_eq!(classified.severity, Severity::Benign);
        assert_eq!(classified.message, "table t already exists");
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_unique_violation_is_hard_integrity_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY); INSERT INTO t VALUES (1);")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES (1)", []).unwrap_err();
        let classified = classify(&SqlRunnerError::from(err)).unwrap();
        assert_eq!(classified.class, ErrorClass::Integrity);
        assert_eq!(classified.severity, Severity::Hard);
        assert!(classified.message.contains("UNIQUE constraint failed"));
    }
}
