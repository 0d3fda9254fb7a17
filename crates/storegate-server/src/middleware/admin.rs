//! Admin session guard.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use storegate_auth::IdentityProvider;
use storegate_core::models::activity::{CreateActivityLogEntry, RESOURCE_API_REQUEST};
use storegate_core::models::session::ValidatedSession;
use tracing::debug;

use super::client::{ClientInfo, admin_token};
use crate::error::ApiError;
use crate::state::AppState;

/// Attached to requests that passed [`require_admin`].
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub session: ValidatedSession,
    pub client: ClientInfo,
}

/// Reject the request with a generic 401 unless it carries a valid
/// admin session. Accepted requests are recorded as
/// `"<METHOD> <path>"` activity.
pub async fn require_admin<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();

    let Some(token) = admin_token(req.headers(), &state.config.cookie_name) else {
        debug!(%path, "Admin request without session token");
        return Err(ApiError::unauthorized());
    };

    let session = state.sessions.validate(&token).await.map_err(|e| {
        debug!(%path, error = %e, "Admin session rejected");
        ApiError::from(e)
    })?;

    let client = ClientInfo::from_parts(req.headers(), req.extensions());

    state.recorder.record(
        CreateActivityLogEntry::new(
            Some(session.principal.id),
            format!("{method} {path}"),
            RESOURCE_API_REQUEST,
        )
        .with_details(serde_json::json!({ "method": method, "path": path }))
        .with_client(client.ip_address.clone(), client.user_agent.clone()),
    );

    req.extensions_mut().insert(AdminContext { session, client });
    Ok(next.run(req).await)
}
