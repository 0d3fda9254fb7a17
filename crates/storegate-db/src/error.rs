//! Database-specific error types and conversions.

use storegate_core::error::GateError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query rejected: {0}")]
    Query(String),

    #[error("Malformed row: {0}")]
    Decode(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    Conflict { entity: String },
}

impl From<DbError> for GateError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GateError::NotFound { entity, id },
            DbError::Conflict { entity } => GateError::Conflict { entity },
            DbError::Decode(msg) => GateError::Internal(msg),
            DbError::Hash(msg) => GateError::Crypto(msg),
            other => GateError::Transient(other.to_string()),
        }
    }
}
