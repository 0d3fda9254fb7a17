//! Storegate Server: HTTP surface for admin sessions, end-user
//! resolution and audited record access.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use storegate_auth::{AuthError, IdentityProvider};
use storegate_core::models::admin::CreateAdminPrincipal;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::{BootstrapAdmin, ServerConfig, Settings};
pub use state::AppState;

/// Build the application router.
pub fn build_router<I: IdentityProvider + 'static>(state: AppState<I>) -> Router {
    let admin = Router::new()
        .route(
            "/admin/session/validate",
            get(routes::admin::validate_session),
        )
        .route("/admin/users/sync", post(routes::admin::sync_users::<I>))
        .route("/system-status", get(routes::health::system_status::<I>))
        .route(
            "/admin/records/{table}",
            get(routes::records::list::<I>).post(routes::records::create::<I>),
        )
        .route(
            "/admin/records/{table}/{id}",
            get(routes::records::fetch::<I>)
                .patch(routes::records::update::<I>)
                .delete(routes::records::remove::<I>),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_admin::<I>,
        ));

    let end_user = Router::new()
        .route("/me", get(routes::me::me))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::resolve_user::<I>,
        ));

    Router::new()
        .route("/health", get(routes::health::health::<I>))
        .route("/admin/login", post(routes::admin::login::<I>))
        .route("/admin/logout", post(routes::admin::logout::<I>))
        .route("/admin/session/refresh", post(routes::admin::refresh::<I>))
        .merge(admin)
        .merge(end_user)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the configured admin unless one with that email exists.
pub async fn bootstrap_admin<I: IdentityProvider>(
    state: &AppState<I>,
    admin: BootstrapAdmin,
) -> Result<(), AuthError> {
    let email = admin.email.clone();
    match state
        .sessions
        .provision_admin(CreateAdminPrincipal {
            email: admin.email,
            password: admin.password,
            role: admin.role,
        })
        .await
    {
        Ok(view) => {
            info!(principal_id = %view.id, email = %view.email, "Bootstrap admin created");
            Ok(())
        }
        Err(AuthError::Conflict(_)) => {
            info!(email = %email, "Bootstrap admin already present");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Periodically deactivate expired sessions.
pub fn spawn_session_sweeper<I: IdentityProvider + 'static>(
    state: AppState<I>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = state.sessions.sweep_expired().await {
                warn!(error = %e, "Session sweep failed");
            }
        }
    })
}
