//! Error types for the package crate.

use std::fmt;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while detecting, reading or normalizing a distribution.
#[derive(Error, Diagnostic, Debug)]
pub enum PackageError {
    #[error(
        "Extension on {filename} is not a valid python extension ({})",
        .accepted.join(", ")
    )]
    #[diagnostic(
        code(wharf_package::unsupported_format),
        help("Upload a wheel, egg, Windows installer or source distribution")
    )]
    UnsupportedFormat {
        filename: String,
        accepted: Vec<&'static str>,
    },

    #[error("Failed to extract metadata from {filename}: {reason}")]
    #[diagnostic(
        code(wharf_package::metadata_extraction),
        help("Make sure the file is a complete, well-formed distribution archive")
    )]
    MetadataExtraction { filename: String, reason: String },

    #[error("Invalid package metadata: {}", join_field_errors(.0))]
    #[diagnostic(
        code(wharf_package::validation),
        help("Fix the listed fields in the distribution's core metadata")
    )]
    Validation(Vec<FieldError>),

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(wharf_package::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },
}

impl PackageError {
    pub(crate) fn extraction(filename: impl Into<String>, reason: impl ToString) -> Self {
        Self::MetadataExtraction {
            filename: filename.into(),
            reason: reason.to_string(),
        }
    }
}

/// A specialized Result type for package operations.
pub type Result<T> = std::result::Result<T, PackageError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            PackageError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_lists_suffixes() {
        let err = PackageError::UnsupportedFormat {
            filename: "pkg.rpm".to_string(),
            accepted: vec![".whl", ".tar.gz"],
        };
        assert_eq!(
            err.to_string(),
            "Extension on pkg.rpm is not a valid python extension (.whl, .tar.gz)"
        );
    }

    #[test]
    fn test_validation_joins_fields() {
        let err = PackageError::Validation(vec![
            FieldError::new("name", "This field is required."),
            FieldError::new("version", "This field is required."),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid package metadata: name: This field is required.; version: This field is required."
        );
    }

    #[test]
    fn test_with_context() {
        let result: std::io::Result<()> = Err(std::io::Error::other("boom"));
        let err = result
            .with_context(|| "opening archive".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "Error while opening archive: boom");
    }
}
