//! Error types for wharf-db.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use miette::Diagnostic;
use thiserror::Error;

/// Database error type for wharf-db operations.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Database connection failed: {0}")]
    #[diagnostic(
        code(wharf_db::connection),
        help("Check that the database path exists and is writable")
    )]
    ConnectionError(String),

    #[error("Database migration failed: {0}")]
    #[diagnostic(
        code(wharf_db::migration),
        help("The database schema may be corrupted or from a newer wharf release")
    )]
    MigrationError(String),

    #[error("Database query failed: {0}")]
    #[diagnostic(code(wharf_db::query))]
    QueryError(String),

    #[error("Record not found")]
    #[diagnostic(code(wharf_db::not_found))]
    NotFound,

    #[error("Unique constraint violated: {0}")]
    #[diagnostic(
        code(wharf_db::conflict),
        help("A record with the same identity already exists")
    )]
    Conflict(String),

    #[error("Database integrity error: {0}")]
    #[diagnostic(
        code(wharf_db::integrity),
        help("A referenced record is missing or still in use")
    )]
    IntegrityError(String),
}

impl DbError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }
}

impl From<DieselError> for DbError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => DbError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DbError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info)
            | DieselError::DatabaseError(DatabaseErrorKind::NotNullViolation, info)
            | DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                DbError::IntegrityError(info.message().to_string())
            }
            DieselError::DatabaseError(_, info) => DbError::QueryError(info.message().to_string()),
            other => DbError::QueryError(other.to_string()),
        }
    }
}

impl From<diesel::result::ConnectionError> for DbError {
    fn from(err: diesel::result::ConnectionError) -> Self {
        DbError::ConnectionError(err.to_string())
    }
}

/// Result type alias for wharf-db operations.
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps() {
        assert!(matches!(DbError::from(DieselError::NotFound), DbError::NotFound));
        assert!(!DbError::NotFound.is_conflict());
    }

    #[test]
    fn test_other_errors_keep_message() {
        let err = DbError::from(DieselError::RollbackTransaction);
        assert!(matches!(err, DbError::QueryError(_)));
    }
}
