//! Error types for the subject cache.

use thiserror::Error;

/// The main error type for subject cache operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Subject with the given name or id could not be loaded.
    ///
    /// Raised for absent records and for store failures alike.
    #[error("Subject '{0}' not found")]
    SubjectNotFound(String),

    /// The cache service was used before `initialize` or after `clean_up`.
    #[error("Subject cache is not initialized")]
    NotInitialized,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors reported by a [`RecordStore`](crate::storage::RecordStore) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record exists for the key.
    #[error("{kind} '{key}' not found")]
    NotFound {
        /// Record kind, e.g. "subject" or "group".
        kind: &'static str,
        /// The key that was looked up.
        key: String,
    },

    /// The backing store failed.
    #[error("Storage operation failed: {0}")]
    Backend(String),
}

impl StoreError {
    /// Shorthand for a missing subject.
    pub fn subject_not_found(key: impl ToString) -> Self {
        StoreError::NotFound {
            kind: "subject",
            key: key.to_string(),
        }
    }

    /// Shorthand for a missing group.
    pub fn group_not_found(key: impl ToString) -> Self {
        StoreError::NotFound {
            kind: "group",
            key: key.to_string(),
        }
    }
}

/// Result type alias for subject cache operations.
pub type Result<T> = std::result::Result<T, Error>;
