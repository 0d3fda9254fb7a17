//! Liveness and detailed status.

use axum::extract::State;
use axum::response::Json;
use chrono::Utc;
use storegate_auth::IdentityProvider;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Always 200; reports `degraded` when the datastore does not answer.
pub async fn health<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
) -> Json<serde_json::Value> {
    let datastore_up = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Datastore health check failed");
            false
        }
    };

    Json(serde_json::json!({
        "status": if datastore_up { "ok" } else { "degraded" },
        "components": {
            "datastore": if datastore_up { "up" } else { "down" },
        },
        "timestamp": Utc::now(),
    }))
}

pub async fn system_status<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let active_sessions = state.sessions.count_active_sessions().await?;
    let sync = state.sync.stats().await?;
    let now = Utc::now();

    Ok(Json(serde_json::json!({
        "status": "ok",
        "startedAt": state.started_at,
        "uptimeSecs": (now - state.started_at).num_seconds().max(0),
        "components": { "datastore": "up" },
        "sessions": { "active": active_sessions },
        "sync": sync,
        "activityLog": state.recorder.stats(),
    })))
}
