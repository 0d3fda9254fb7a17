//! End-user resolution with opportunistic identity sync.
//!
//! Never rejects a request: a missing or rejected bearer token yields an
//! anonymous context, and a failed sync still lets the request through.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use storegate_auth::sync::SyncAction;
use storegate_auth::{IdentityError, IdentityProvider};
use storegate_core::models::identity::ExternalIdentity;
use storegate_core::models::local_user::LocalUserRecord;
use tracing::{debug, warn};

use super::client::bearer_token;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Principal {
    Anonymous,
    User {
        identity: ExternalIdentity,
        /// Absent when the sync for this request failed.
        local: Option<LocalUserRecord>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSyncAction {
    None,
    Existing,
    Created,
    Failed,
}

impl From<SyncAction> for RequestSyncAction {
    fn from(action: SyncAction) -> Self {
        match action {
            SyncAction::Existing => RequestSyncAction::Existing,
            SyncAction::Created => RequestSyncAction::Created,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub principal: Principal,
    pub sync_action: RequestSyncAction,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self {
            principal: Principal::Anonymous,
            sync_action: RequestSyncAction::None,
        }
    }
}

pub async fn resolve_user<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
    mut req: Request,
    next: Next,
) -> Response {
    let context = match bearer_token(req.headers()) {
        None => RequestContext::anonymous(),
        Some(token) => resolve(&state, &token).await,
    };
    req.extensions_mut().insert(context);
    next.run(req).await
}

async fn resolve<I: IdentityProvider>(state: &AppState<I>, token: &str) -> RequestContext {
    let identity = match state.identity.authenticate(token).await {
        Ok(identity) => identity,
        Err(IdentityError::Unauthenticated) => {
            debug!("Bearer token rejected by identity provider");
            return RequestContext::anonymous();
        }
        Err(e) => {
            warn!(error = %e, "Identity provider unavailable; continuing anonymously");
            return RequestContext::anonymous();
        }
    };

    match state.sync.sync_one(&identity).await {
        Ok(outcome) => RequestContext {
            sync_action: outcome.action.into(),
            principal: Principal::User {
                identity,
                local: Some(outcome.record),
            },
        },
        Err(e) => {
            // Retried on the user's next request.
            warn!(external_id = %identity.external_id, error = %e, "Request-path sync failed");
            RequestContext {
                sync_action: RequestSyncAction::Failed,
                principal: Principal::User {
                    identity,
                    local: None,
                },
            }
        }
    }
}
