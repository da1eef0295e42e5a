//! Error taxonomy shared across the ingestion and retrieval pipeline.
//!
//! Each variant maps to a distinct failure class with its own recovery
//! policy: [`Error::InvalidInput`] is the caller's fault and never retried,
//! [`Error::ExternalService`] may be retried by the caller with backoff,
//! [`Error::Storage`] is terminal for the current operation and always
//! follows a rollback.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Empty text or query, or a vector of the wrong dimensionality.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The upstream embedding service failed or returned a malformed response.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// A unique constraint was violated (duplicate storage key).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An operation referenced an unknown document id.
    #[error("not found: {0}")]
    NotFound(String),

    /// A transactional failure in the persistent store.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Text extraction was asked to handle an unrecognized MIME type.
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
}

pub type Result<T> = std::result::Result<T, Error>;
