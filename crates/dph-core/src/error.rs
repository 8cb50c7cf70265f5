//! # Validation Errors
//!
//! Field-level rejections of user-supplied project, version and account
//! data. These are client errors: the message names the offending field so
//! the caller can correct the request.

use thiserror::Error;

/// A user-supplied field failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field is missing or blank.
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    /// Field exceeds its maximum length in characters.
    #[error("{field} must be at most {max} characters, got {actual}")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Field is shorter than its minimum length in characters.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    /// Field contains characters outside its allowed alphabet.
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters {
        field: &'static str,
        reason: &'static str,
    },

    /// Numeric field is outside its accepted range.
    #[error("{field} must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        actual: i64,
    },
}
