//! Storegate Server: Application entry point.

use std::net::SocketAddr;
use std::time::Duration;

use storegate_auth::HttpIdentityProvider;
use storegate_db::DbManager;
use storegate_server::{AppState, Settings, bootstrap_admin, build_router, spawn_session_sweeper};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storegate=info,tower_http=info")),
        )
        .json()
        .init();

    tracing::info!("Starting storegate server...");

    let settings = Settings::from_env();

    let db = DbManager::connect(&settings.db).await?;
    storegate_db::run_migrations(db.client()).await?;

    let identity = HttpIdentityProvider::new(settings.identity.clone())?;
    let state = AppState::new(
        db,
        identity,
        settings.auth.clone(),
        settings.server.clone(),
    );

    if let Some(admin) = settings.bootstrap_admin.clone() {
        bootstrap_admin(&state, admin).await?;
    }

    if settings.server.sweep_interval_secs > 0 {
        spawn_session_sweeper(
            state.clone(),
            Duration::from_secs(settings.server.sweep_interval_secs),
        );
    }

    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr).await?;
    tracing::info!(addr = %settings.server.bind_addr, "Listening");

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Storegate server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
