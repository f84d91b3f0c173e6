//! Error kinds returned by the credential orchestrator.
//!
//! Domain kinds are expected outcomes and reach the boundary unchanged.
//! `StoreUnavailable` and `Internal` are opaque: the underlying fault is
//! logged where it happens and never carried in the error itself.

use crate::store::StoreError;
use thiserror::Error;

/// Errors from [`crate::service::AuthService`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("account already exists")]
    AlreadyExists,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("bad credentials")]
    BadCredentials,

    #[error("invalid role")]
    InvalidRole,

    #[error("verification failed")]
    VerificationFailed,

    /// Transient store fault; the caller may retry.
    #[error("service temporarily unavailable")]
    StoreUnavailable,

    #[error("internal error")]
    Internal,
}

impl AuthError {
    /// Get a static error code string for metrics labeling and response bodies.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::AlreadyExists => "already_exists",
            Self::NotFound(_) => "not_found",
            Self::BadCredentials => "bad_credentials",
            Self::InvalidRole => "invalid_role",
            Self::VerificationFailed => "verification_failed",
            Self::StoreUnavailable => "store_unavailable",
            Self::Internal => "internal_error",
        }
    }

    /// Whether this is an expected domain outcome rather than a fault.
    pub fn is_domain(&self) -> bool {
        !matches!(self, Self::StoreUnavailable | Self::Internal)
    }
}

impl From<&StoreError> for AuthError {
    fn from(err: &StoreError) -> Self {
        if err.is_transient() {
            AuthError::StoreUnavailable
        } else {
            AuthError::Internal
        }
    }
}

/// Result type for orchestrator operations.
pub type AuthResult<T> = Result<T, AuthError>;
