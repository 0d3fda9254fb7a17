//! Authentication, synchronization and identity-provider error types.

use storegate_core::error::GateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email, inactive principal or wrong password. Never says
    /// which.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is locked")]
    AccountLocked,

    /// Missing, expired, revoked or orphaned session.
    #[error("invalid or expired session")]
    InvalidOrExpiredSession,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("datastore unavailable: {0}")]
    Datastore(#[source] GateError),
}

impl From<GateError> for AuthError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Crypto(msg) => AuthError::Crypto(msg),
            GateError::Validation { message } => AuthError::Validation(message),
            GateError::Conflict { entity } => AuthError::Conflict(entity),
            other => AuthError::Datastore(other),
        }
    }
}

impl From<AuthError> for GateError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountLocked
            | AuthError::InvalidOrExpiredSession => GateError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::Validation(message) => GateError::Validation { message },
            AuthError::Conflict(entity) => GateError::Conflict { entity },
            AuthError::Crypto(msg) => GateError::Crypto(msg),
            AuthError::Datastore(inner) => inner,
        }
    }
}

/// Identity reconciliation failed. Recorded in the sync log and never
/// surfaced to end users as a hard failure.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("identity cannot be synchronized: {0}")]
    InvalidIdentity(String),

    #[error("sync failed for {external_id}: {source}")]
    Datastore {
        external_id: String,
        #[source]
        source: GateError,
    },

    #[error("identity provider error: {0}")]
    Provider(#[from] IdentityError),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("bearer token rejected by identity provider")]
    Unauthenticated,

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected identity provider response: {0}")]
    Malformed(String),
}
