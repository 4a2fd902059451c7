//! Gallery Server - REST API republishing a Notion database
//!
//! Exposes gallery-core over HTTP:
//! - GET /api/collections - All published collections
//! - GET /api/collection/{id} - One collection with every image
//! - GET /images/{file} - Durably cached images

use std::net::SocketAddr;

use gallery_server::{create_router, AppState, Config};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gallery_server=debug,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    let state = match AppState::from_config(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            std::process::exit(1);
        }
    };
    tracing::debug!(?state, "Application state ready");

    let app = create_router(state, &config);
    let addr = config.socket_addr();

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Gallery server listening on {}", addr);
    tracing::info!("  GET /api/collections   - List collections");
    tracing::info!("  GET /api/collection/id - Collection detail");
    tracing::info!("  GET /images/{{file}}     - Cached images");
    tracing::info!("  GET /health            - Health check");

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
