//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type returned by storage collaborators.
pub type StorageResult<T> = Result<T, StorageError>;

/// Domain-level error.
///
/// Validation and role errors are produced before any storage call is made.
/// Storage failures are carried through unchanged so callers can tell a
/// genuine I/O problem apart from a conflict.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A role key that the role catalog does not define.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// An identifier was invalid (e.g. not a tenant slug).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule was violated (duplicate tenant id or domain).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A backing collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_role(role: impl Into<String>) -> Self {
        Self::InvalidRole(role.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// `true` for errors raised by input checks, before any storage access.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidRole(_) | Self::InvalidId(_)
        )
    }
}

/// Failure reported by a storage collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The store rejected a write because of a uniqueness constraint.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The store could not be reached (pool closed, connection refused, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }
}
