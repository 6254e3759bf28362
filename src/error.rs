//! Error types for Arbor.

use thiserror::Error;

use crate::tree::ValidationError;

/// Common error type for Arbor.
#[derive(Error, Debug)]
pub enum ArborError {
    /// A name, path or MIME type failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced id or path is absent.
    #[error("{0} not found")]
    NotFound(String),

    /// Another node already occupies the target path.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Mutation of an immutable node (the root) was attempted.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A folder was about to be moved into its own subtree.
    #[error("cyclic move: {0}")]
    Cyclic(String),

    /// Database error.
    ///
    /// Errors from sqlx are converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error from the body store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive writer error.
    #[error("archive error: {0}")]
    Archive(String),

    /// The body store was mutated but the metadata transaction could not be
    /// committed afterwards, so the two stores no longer agree.
    #[error("metadata and body stores diverged: {0}")]
    Diverged(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of an [`ArborError`], as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Cyclic,
    /// Opaque server-side failure of the metadata or body store.
    StoreFailure,
}

impl ArborError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArborError::Validation(_) => ErrorKind::Validation,
            ArborError::NotFound(_) => ErrorKind::NotFound,
            ArborError::Conflict(_) => ErrorKind::Conflict,
            ArborError::Forbidden(_) => ErrorKind::Forbidden,
            ArborError::Cyclic(_) => ErrorKind::Cyclic,
            ArborError::Database(_)
            | ArborError::Io(_)
            | ArborError::Archive(_)
            | ArborError::Diverged(_)
            | ArborError::Config(_) => ErrorKind::StoreFailure,
        }
    }

    /// Whether the caller can correct the request and retry.
    pub fn is_client_error(&self) -> bool {
        self.kind() != ErrorKind::StoreFailure
    }
}

impl From<sqlx::Error> for ArborError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => ArborError::NotFound("row".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ArborError::Conflict(db.message().to_string())
            }
            _ => ArborError::Database(e.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for ArborError {
    fn from(e: zip::result::ZipError) -> Self {
        ArborError::Archive(e.to_string())
    }
}

/// Result type alias for Arbor operations.
pub type Result<T> = std::result::Result<T, ArborError>;
