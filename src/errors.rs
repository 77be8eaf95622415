//! Unified error type for the budget data layer.
//!
//! Storage failures are always tagged with the adapter operation that failed, so the
//! message a caller surfaces to the user says what was being attempted.

use std::fmt::Display;
use thiserror::Error;

/// Errors produced by the stores, the identity provider and the business logic.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced entity (profile, period, transaction, ...) does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up
        entity: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    /// Input was out of range or malformed.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Name of the offending field
        field: &'static str,
        /// Human-readable explanation
        message: String,
    },

    /// The underlying store failed to read or write.
    #[error("Store operation `{operation}` failed: {message}")]
    Store {
        /// Adapter operation that failed
        operation: &'static str,
        /// Message reported by the storage engine
        message: String,
    },

    /// Sign-up / sign-in failures.
    #[error("Authentication error: {message}")]
    Auth {
        /// Human-readable explanation
        message: String,
    },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable explanation
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(value: sea_orm::DbErr) -> Self {
        Self::Store {
            operation: "database",
            message: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Store {
            operation: "serialize",
            message: value.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Store {
            operation: "io",
            message: value.to_string(),
        }
    }
}

/// Tags a storage-level failure with the name of the adapter operation.
pub trait StoreResultExt<T> {
    /// Converts the error side into [`Error::Store`] naming `operation`.
    fn store_op(self, operation: &'static str) -> Result<T>;
}

impl<T, E: Display> StoreResultExt<T> for std::result::Result<T, E> {
    fn store_op(self, operation: &'static str) -> Result<T> {
        self.map_err(|e| Error::Store {
            operation,
            message: e.to_string(),
        })
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
