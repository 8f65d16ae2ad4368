//! Error types for wharf-core.

use std::error::Error;

use miette::Diagnostic;
use thiserror::Error;
use wharf_config::error::ConfigError;
use wharf_db::DbError;
use wharf_package::{FieldError, PackageError};
use wharf_utils::error::{FileSystemError, HashError, PathError};

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Core error type for wharf operations.
#[derive(Error, Diagnostic, Debug)]
pub enum WharfError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    #[diagnostic(code(wharf::filesystem), help("Check file permissions and disk space"))]
    FileSystemError(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(wharf::hash))]
    HashError(#[from] HashError),

    #[error(transparent)]
    #[diagnostic(code(wharf::path), help("Check the configured paths"))]
    PathError(#[from] PathError),

    #[error("Error while {action}")]
    #[diagnostic(code(wharf::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(wharf::json))]
    Json(#[from] serde_json::Error),

    #[error("{field}: This field is required.")]
    #[diagnostic(code(wharf::missing_field))]
    MissingField { field: &'static str },

    #[error("Invalid request: {}", join_field_errors(.0))]
    #[diagnostic(code(wharf::validation))]
    Validation(Vec<FieldError>),

    #[error("{kind} '{name}' not found")]
    #[diagnostic(
        code(wharf::not_found),
        help("Check the name, or list existing records first")
    )]
    NotFound { kind: &'static str, name: String },

    #[error("{0}")]
    #[diagnostic(code(wharf::conflict))]
    Conflict(String),

    #[error("Invalid request: {0}")]
    #[diagnostic(code(wharf::invalid_request))]
    InvalidRequest(String),

    #[error("Job {job_id} is running and cannot be canceled")]
    #[diagnostic(
        code(wharf::job_not_cancelable),
        help("Wait for the job to finish; only queued jobs can be canceled")
    )]
    JobNotCancelable { job_id: i32 },

    #[error("Job {job_id} no longer holds its reservations")]
    #[diagnostic(
        code(wharf::lease_lost),
        help("The lease expired and the job was recovered; its changes were rolled back")
    )]
    LeaseLost { job_id: i32 },

    #[error("Job worker failed: {0}")]
    #[diagnostic(code(wharf::worker))]
    Worker(String),

    #[error("Thread lock poison error")]
    #[diagnostic(
        code(wharf::poison),
        help("This is an internal error, please report it")
    )]
    PoisonError,

    #[error("{0}")]
    #[diagnostic(code(wharf::error))]
    Custom(String),
}

impl From<diesel::result::Error> for WharfError {
    fn from(err: diesel::result::Error) -> Self {
        WharfError::Database(DbError::from(err))
    }
}

impl WharfError {
    /// True for errors caused by the caller's input rather than by wharf or its storage.
    pub fn is_client_error(&self) -> bool {
        match self {
            WharfError::Package(_)
            | WharfError::MissingField { .. }
            | WharfError::Validation(_)
            | WharfError::NotFound { .. }
            | WharfError::Conflict(_)
            | WharfError::InvalidRequest(_)
            | WharfError::JobNotCancelable { .. } => true,
            WharfError::Database(err) => err.is_conflict(),
            _ => false,
        }
    }

    /// Field-level errors carried by validation failures, empty for everything else.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            WharfError::Validation(errors) | WharfError::Package(PackageError::Validation(errors)) => {
                errors.clone()
            }
            WharfError::MissingField { field } => {
                vec![FieldError::new(*field, "This field is required.")]
            }
            _ => Vec::new(),
        }
    }

    /// A single-field validation error.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        WharfError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        WharfError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Returns the root cause message, walking the error source chain.
    pub fn root_cause(&self) -> String {
        let mut current: &dyn Error = self;
        while let Some(source) = current.source() {
            current = source;
        }
        current.to_string()
    }
}

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T, WharfError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T, WharfError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            WharfError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
