//! Admin authentication endpoints.

use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Json};
use axum::Extension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storegate_auth::service::{LoginInput, LoginOutput, RefreshInput};
use storegate_auth::sync::SyncReport;
use storegate_auth::IdentityProvider;
use storegate_core::models::admin::AdminView;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::middleware::AdminContext;
use crate::middleware::client::{ClientInfo, admin_token};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AdminView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub user: AdminView,
    pub expires_at: DateTime<Utc>,
    pub remember_me: bool,
}

fn session_cookie(config: &ServerConfig, token: &str, expires_at: DateTime<Utc>) -> String {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    let mut cookie = format!(
        "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
        config.cookie_name
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cleared_cookie(config: &ServerConfig) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.cookie_name
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn issued(config: &ServerConfig, out: LoginOutput) -> impl IntoResponse + use<> {
    let cookie = session_cookie(config, &out.session_token, out.expires_at);
    (
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse {
            session_token: out.session_token,
            refresh_token: out.refresh_token,
            expires_at: out.expires_at,
            user: out.principal,
        }),
    )
}

pub async fn login<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
    client: ClientInfo,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let out = state
        .sessions
        .login(LoginInput {
            email: body.email,
            password: body.password,
            remember_me: body.remember_me,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        })
        .await?;
    Ok(issued(&state.config, out))
}

pub async fn logout<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
    client: ClientInfo,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = admin_token(&headers, &state.config.cookie_name) {
        state
            .sessions
            .logout(&token, client.ip_address, client.user_agent)
            .await?;
    }
    Ok((
        [(header::SET_COOKIE, cleared_cookie(&state.config))],
        Json(serde_json::json!({ "success": true })),
    ))
}

pub async fn validate_session(Extension(admin): Extension<AdminContext>) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        valid: true,
        user: admin.session.principal,
        expires_at: admin.session.expires_at,
        remember_me: admin.session.is_remember_me,
    })
}

pub async fn refresh<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
    client: ClientInfo,
    Json(body): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let out = state
        .sessions
        .refresh(RefreshInput {
            refresh_token: body.refresh_token,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        })
        .await?;
    Ok(issued(&state.config, out))
}

pub async fn sync_users<I: IdentityProvider + 'static>(
    State(state): State<AppState<I>>,
) -> Result<Json<SyncReport>, ApiError> {
    let report = state.sync.sync_all(state.identity.as_ref()).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_attributes() {
        let config = ServerConfig::default();
        let cookie = session_cookie(&config, "tok", Utc::now() + chrono::Duration::hours(1));
        assert!(cookie.starts_with("storegate_admin_session=tok; Path=/; HttpOnly"));
        assert!(cookie.ends_with("; Secure"));

        let insecure = ServerConfig {
            cookie_secure: false,
            ..ServerConfig::default()
        };
        let cleared = cleared_cookie(&insecure);
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
    }
}
