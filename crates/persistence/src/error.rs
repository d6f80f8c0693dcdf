//! Error types for the persistence layer.
//!
//! This module defines all error types used throughout the persistence layer,
//! following a hierarchy that separates resource state errors, validation
//! errors, transaction errors, and backend errors. Callers that only need the
//! coarse outcome can use [`StorageError::kind`].

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

/// The primary error type for all storage operations.
///
/// This enum encompasses all possible errors that can occur during persistence
/// operations, organized by category.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Resource state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transaction errors
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Coarse error taxonomy shared by every operation in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The addressed document does not exist.
    NotFound,
    /// A uniqueness constraint rejected the write.
    Duplicate,
    /// The input was rejected before touching the store.
    Validation,
    /// The store or a collaborator failed.
    Upstream,
    /// A bounded retry loop ran out of attempts.
    Exhausted,
    /// The caller's deadline elapsed.
    DeadlineExceeded,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not-found"),
            ErrorKind::Duplicate => write!(f, "duplicate"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Upstream => write!(f, "upstream"),
            ErrorKind::Exhausted => write!(f, "exhausted"),
            ErrorKind::DeadlineExceeded => write!(f, "deadline-exceeded"),
        }
    }
}

impl StorageError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Resource(ResourceError::NotFound { .. }) => ErrorKind::NotFound,
            StorageError::Resource(_) => ErrorKind::Duplicate,
            StorageError::Validation(_) => ErrorKind::Validation,
            StorageError::Transaction(TransactionError::Timeout { .. }) => {
                ErrorKind::DeadlineExceeded
            }
            StorageError::Transaction(TransactionError::ShareCodeRetriesExhausted { .. }) => {
                ErrorKind::Exhausted
            }
            StorageError::Transaction(_) | StorageError::Backend(_) => ErrorKind::Upstream,
        }
    }

    /// Returns true if this error reports a missing document.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Returns true if the unit of work that produced this error may be run
    /// again in a fresh transaction.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Transaction(TransactionError::Transient { .. })
        )
    }

    /// Returns true if a commit may be attempted again.
    pub fn is_unknown_commit_result(&self) -> bool {
        matches!(
            self,
            StorageError::Transaction(TransactionError::UnknownCommitResult { .. })
        )
    }

    /// Returns true if a clinic insert collided on a share code.
    pub fn is_duplicate_share_code(&self) -> bool {
        matches!(
            self,
            StorageError::Resource(ResourceError::DuplicateShareCode { .. })
        )
    }

    /// Shorthand for a [`ResourceError::NotFound`].
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        StorageError::Resource(ResourceError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        })
    }
}

/// Errors related to resource state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested resource was not found.
    #[error("resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    /// A resource with the same unique key already exists.
    #[error("resource already exists: {resource_type}/{id}")]
    AlreadyExists { resource_type: String, id: String },

    /// Another clinic already owns the share code.
    #[error("duplicate share code: {share_code}")]
    DuplicateShareCode { share_code: String },
}

/// Errors related to input validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Missing required field.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    /// A summary was handed to a repository for a different summary type.
    #[error("invalid summary type: expected '{expected}', got '{actual}'")]
    SummaryTypeMismatch { expected: String, actual: String },

    /// An argument could not be interpreted.
    #[error("invalid {argument}: {message}")]
    InvalidArgument { argument: String, message: String },

    /// The operation would break a domain constraint.
    #[error("constraint violation: {message}")]
    ConstraintViolation { message: String },
}

/// Errors related to transactions.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// A session could not be opened or a transaction could not be started.
    #[error("session unavailable: {message}")]
    SessionUnavailable { message: String },

    /// Transaction timed out.
    #[error("transaction timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// No unique share code could be found.
    #[error("unable to generate a unique share code after {attempts} attempts")]
    ShareCodeRetriesExhausted { attempts: usize },

    /// Transaction was rolled back.
    #[error("transaction rolled back: {reason}")]
    RolledBack { reason: String },

    /// The store aborted the transaction on a transient condition such as a
    /// write conflict. The whole unit of work may run again.
    #[error("transient transaction failure: {message}")]
    Transient { message: String },

    /// The store could not confirm whether the commit applied. The commit
    /// may be attempted again.
    #[error("commit result unknown: {message}")]
    UnknownCommitResult { message: String },

    /// Transaction is no longer valid (already committed or rolled back).
    #[error("transaction no longer valid")]
    InvalidTransaction,
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A store operation failed against a specific collection.
    #[error("{operation} on '{collection}' failed in {backend_name}: {message}")]
    OperationFailed {
        backend_name: String,
        operation: String,
        collection: String,
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// Implement conversions from common error types

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "mongodb")]
impl StorageError {
    /// Maps a driver error carrying a transaction retry label onto the
    /// matching [`TransactionError`].
    pub(crate) fn from_transaction_label(err: &mongodb::error::Error) -> Option<Self> {
        use mongodb::error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};

        if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) {
            Some(StorageError::Transaction(TransactionError::UnknownCommitResult {
                message: err.to_string(),
            }))
        } else if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
            Some(StorageError::Transaction(TransactionError::Transient {
                message: err.to_string(),
            }))
        } else {
            None
        }
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for StorageError {
    fn from(err: mongodb::error::Error) -> Self {
        if let Some(labelled) = StorageError::from_transaction_label(&err) {
            return labelled;
        }
        StorageError::Backend(BackendError::Internal {
            backend_name: "mongodb".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::bson::ser::Error> for StorageError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::bson::de::Error> for StorageError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::not_found("Clinic", "123");
        assert_eq!(err.to_string(), "resource not found: Clinic/123");
    }

    #[test]
    fn test_summary_type_mismatch_display() {
        let err = ValidationError::SummaryTypeMismatch {
            expected: "cgm".to_string(),
            actual: "bgm".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid summary type: expected 'cgm', got 'bgm'"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            StorageError::not_found("Clinic", "1").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            StorageError::from(ResourceError::DuplicateShareCode {
                share_code: "ABCD-EFGH-JKLM".to_string()
            })
            .kind(),
            ErrorKind::Duplicate
        );
        assert_eq!(
            StorageError::from(TransactionError::Timeout { timeout_ms: 5 }).kind(),
            ErrorKind::DeadlineExceeded
        );
        assert_eq!(
            StorageError::from(TransactionError::ShareCodeRetriesExhausted { attempts: 100 })
                .kind(),
            ErrorKind::Exhausted
        );
        assert_eq!(
            StorageError::from(ValidationError::MissingRequiredField {
                field: "userId".to_string()
            })
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            StorageError::from(TransactionError::SessionUnavailable {
                message: "no primary".to_string()
            })
            .kind(),
            ErrorKind::Upstream
        );
    }

    #[test]
    fn test_retry_classification() {
        let transient = StorageError::from(TransactionError::Transient {
            message: "WriteConflict".to_string(),
        });
        assert!(transient.is_transient());
        assert!(!transient.is_unknown_commit_result());
        assert_eq!(transient.kind(), ErrorKind::Upstream);

        let unknown = StorageError::from(TransactionError::UnknownCommitResult {
            message: "primary stepped down".to_string(),
        });
        assert!(unknown.is_unknown_commit_result());
        assert!(!unknown.is_transient());

        assert!(!StorageError::not_found("Clinic", "1").is_transient());
    }

    #[test]
    fn test_duplicate_share_code_detection() {
        let err: StorageError = ResourceError::DuplicateShareCode {
            share_code: "ABCD-EFGH-JKLM".to_string(),
        }
        .into();
        assert!(err.is_duplicate_share_code());

        let err: StorageError = ResourceError::AlreadyExists {
            resource_type: "Clinician".to_string(),
            id: "x".to_string(),
        }
        .into();
        assert!(!err.is_duplicate_share_code());
    }

    #[test]
    fn test_serde_error_converts_to_backend() {
        let err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let storage_err: StorageError = err.into();
        assert!(matches!(
            storage_err,
            StorageError::Backend(BackendError::SerializationError { .. })
        ));
    }
}
