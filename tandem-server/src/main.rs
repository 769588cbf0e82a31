//! Tandem Server - WebSocket relay for cross-device remote signing
//!
//! Endpoints:
//! - GET /api/v1/remote/{id} - Join the relay room for a challenge (WebSocket)
//! - GET /health - Health check
//! - GET /ready - Readiness probe

use std::net::SocketAddr;

use tandem_server::{create_router_with_config, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tandem_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    let addr = config.socket_addr();
    let app = create_router_with_config(&config);

    tracing::info!(
        address = %addr,
        max_frame_bytes = config.max_frame_bytes,
        version = env!("CARGO_PKG_VERSION"),
        "Tandem relay listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
