//! Error taxonomy shared by every engine operation

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No session, or the session no longer maps to an account
    #[error("Sign-in required")]
    AuthenticationRequired,

    /// Authenticated, but the caller may not perform this action
    #[error("Not permitted: {0}")]
    AuthorizationDenied(String),

    /// Required input is missing or malformed; nothing was written
    #[error("Invalid input: {0}")]
    ValidationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A precondition on the stored record no longer holds
    #[error("Record changed concurrently: {0}")]
    ConflictOrStale(String),

    #[error("Store unavailable: {0}")]
    TransientStoreFailure(String),
}

impl Error {
    /// Whether the same call may succeed if simply retried later.
    ///
    /// Conflicts are not retryable as-is: the caller has to re-fetch first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientStoreFailure(_))
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Error::AuthorizationDenied(reason.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Error::ValidationFailed(reason.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Error::ConflictOrStale(reason.into())
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Error::TransientStoreFailure(reason.into())
    }
}
