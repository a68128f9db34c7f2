//! Error types for LicenseGraph.
//!
//! Library crates use [`LicenseGraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all LicenseGraph operations.
#[derive(Debug, thiserror::Error)]
pub enum LicenseGraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while downloading the source catalog.
    #[error("network error: {0}")]
    Network(String),

    /// CSV decoding error (bad encoding, unbalanced quotes, ...).
    #[error("csv error: {0}")]
    Csv(String),

    /// A catalog row is missing a required field.
    #[error("malformed row {row}: missing required field `{field}`")]
    MalformedRow { row: usize, field: &'static str },

    /// Two different products share a `string_id` and the policy forbids it.
    #[error(
        "duplicate string_id `{string_id}` on products {first_guid} and {second_guid}"
    )]
    DuplicateStringId {
        string_id: String,
        first_guid: String,
        second_guid: String,
    },

    /// A query was made before any catalog generation was published.
    #[error("license data not generated yet")]
    NotReady,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid JSON, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LicenseGraphError>;

impl LicenseGraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a malformed-row error. `row` is 1-based over data rows.
    pub fn malformed_row(row: usize, field: &'static str) -> Self {
        Self::MalformedRow { row, field }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
