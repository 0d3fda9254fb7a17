//! Error types for the storegate identity core.

use thiserror::Error;

/// Outcome of a datastore or domain operation that did not succeed.
///
/// Callers branch on the variant, never on provider-specific error text:
/// `NotFound` and `Conflict` are expected outcomes of keyed lookups and
/// guarded inserts, `Transient` covers every storage failure that may
/// succeed on retry.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    Conflict { entity: String },

    #[error("Datastore unavailable: {0}")]
    Transient(String),

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GateError::NotFound { .. })
    }
}

pub type GateResult<T> = Result<T, GateError>;
