//! Warden Server - Main entry point

use std::sync::Arc;

use anyhow::Context;
use warden_core::{
    api::{self, AppState},
    config::Config,
    db::Database,
    middleware::Authenticator,
    observability,
    rbac::{PermissionService, PgPermissionStore},
    users::PgUserRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    observability::init("warden-server", &config.observability)?;
    let metrics = observability::metrics::install_recorder()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting Warden Server"
    );

    // Connect to database and bring the schema up to date
    let db = Database::new(&config.database).await?;
    db.migrate().await?;
    db.ping().await?;

    let users = Arc::new(PgUserRepository::new(db.pool().clone()));
    let permissions = Arc::new(PermissionService::new(Arc::new(PgPermissionStore::new(
        db.pool().clone(),
    ))));
    let authenticator = Arc::new(Authenticator::new(&config.auth));

    let state = AppState::new(users, permissions, authenticator).with_metrics(metrics);

    if let Some(admin) = &config.auth.bootstrap_admin {
        let user = state
            .users
            .ensure_admin(&admin.name, &admin.email, &admin.password)
            .await?;
        tracing::info!(user_id = %user.id, email = %user.email, "Bootstrap admin ready");
    }

    let app = api::build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    observability::shutdown();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
