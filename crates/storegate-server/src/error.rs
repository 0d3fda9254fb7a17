//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use storegate_auth::{AuthError, SyncError};
use storegate_core::error::GateError;
use tracing::{error, warn};

/// API error with HTTP status code, error code, and client-facing
/// message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// The single response for every failed admin authentication.
    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Authentication required",
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Internal server error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "message": self.message,
                "code": self.code,
                "status": self.status.as_u16(),
            }
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            // Locked and unknown accounts are indistinguishable to the
            // client; the distinction lives in the logs.
            AuthError::InvalidCredentials | AuthError::AccountLocked => Self::new(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid email or password",
            ),
            AuthError::InvalidOrExpiredSession => Self::unauthorized(),
            AuthError::Validation(message) => Self::bad_request(message),
            AuthError::Conflict(_) => Self::new(StatusCode::CONFLICT, "CONFLICT", "Already exists"),
            AuthError::Crypto(msg) => {
                error!(error = %msg, "Credential processing failed");
                Self::internal()
            }
            AuthError::Datastore(inner) => inner.into(),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::NotFound { entity, .. } => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{entity} not found"))
            }
            GateError::Conflict { entity } => Self::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("{entity} already exists"),
            ),
            GateError::Validation { message } => Self::bad_request(message),
            GateError::AuthenticationFailed { .. } => Self::unauthorized(),
            GateError::Transient(msg) => {
                warn!(error = %msg, "Datastore unavailable");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATASTORE_UNAVAILABLE",
                    "Internal server error",
                )
            }
            GateError::Crypto(msg) | GateError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                Self::internal()
            }
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        error!(error = %e, "Identity synchronization failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "SYNC_FAILED",
            "Identity synchronization failed",
        )
    }
}
