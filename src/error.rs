// Error taxonomy
// NotFound / NoData / Validation are recoverable at the call site;
// store failures are surfaced as-is.

use thiserror::Error;

// ============================================================================
// VALIDATION
// ============================================================================

/// Malformed operator input, rejected before any statement is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A projected column was not present in the row.
    #[error("column '{0}' missing from row")]
    MissingColumn(String),

    /// A column held a value of an unexpected type (or NULL).
    #[error("column '{column}' is not a valid {expected}")]
    InvalidValue {
        column: String,
        expected: &'static str,
    },
}

// ============================================================================
// REPOSITORY (CRUD)
// ============================================================================

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Unique or foreign-key constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for RecordsError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                RecordsError::Constraint(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            other => RecordsError::Store(StoreError::Sqlite(other)),
        }
    }
}

// ============================================================================
// REPORTING
// ============================================================================

#[derive(Debug, Error)]
pub enum ReportError {
    /// Referenced student/course does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The parent exists but the aggregation ran over an empty set.
    #[error("no data: {0}")]
    NoData(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to format report")]
    Format(#[from] std::fmt::Error),
}

impl ReportError {
    /// True for the two "nothing to show" outcomes the shell just prints.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ReportError::NotFound { .. } | ReportError::NoData(_))
    }
}

pub type RecordsResult<T> = Result<T, RecordsError>;
pub type ReportResult<T> = Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violation_is_mapped() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (v TEXT UNIQUE)", []).unwrap();
        conn.execute("INSERT INTO t (v) VALUES ('a')", []).unwrap();

        let err: RecordsError = conn
            .execute("INSERT INTO t (v) VALUES ('a')", [])
            .unwrap_err()
            .into();

        assert!(matches!(err, RecordsError::Constraint(_)));
    }

    #[test]
    fn test_report_error_recoverability() {
        assert!(ReportError::NoData("grades").is_recoverable());
        assert!(ReportError::NotFound { entity: "Student", id: 7 }.is_recoverable());
        assert!(!ReportError::Format(std::fmt::Error).is_recoverable());
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("email", "invalid format");
        assert_eq!(err.to_string(), "email: invalid format");
    }
}
