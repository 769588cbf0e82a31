//! HTTP surface of the relay: the room socket, probes and middleware.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, Method, StatusCode, Uri},
    routing::get,
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ApiError;
use crate::handlers::{health, ready, remote_handler};
use crate::state::AppState;

/// Relay router with [`Config::default`]: any origin, no rate limit.
pub fn create_router() -> Router {
    create_router_with_config(&Config::default())
}

pub fn create_router_with_config(config: &Config) -> Router {
    create_router_with_state(config, AppState::new(config.max_frame_bytes))
}

fn cors_layer(config: &Config) -> CorsLayer {
    match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!(origins = origins.len(), "CORS restricted");
            // Browsers send the upgrade as a GET.
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        }
        _ => {
            tracing::warn!("CORS open to every origin");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Builds the router around `state`, so tests can inspect the hub.
pub fn create_router_with_state(config: &Config, state: AppState) -> Router {
    // Stops counting once the socket is upgraded.
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    let router = Router::new()
        .route("/api/v1/remote/{id}", get(remote_handler))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .fallback(not_found)
        .with_state(state)
        .layer(cors_layer(config))
        .layer(timeout);

    if !config.rate_limit_enabled {
        tracing::debug!("Rate limiting off");
        return router.layer(TraceLayer::new_for_http());
    }

    let governor = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_sec)
        .burst_size(config.rate_limit_burst)
        .finish();
    match governor {
        Some(governor) => {
            tracing::info!(
                per_sec = config.rate_limit_per_sec,
                burst = config.rate_limit_burst,
                "Rate limiting on"
            );
            router
                .layer(GovernorLayer::new(Arc::new(governor)))
                .layer(TraceLayer::new_for_http())
        }
        None => {
            tracing::error!(
                per_sec = config.rate_limit_per_sec,
                burst = config.rate_limit_burst,
                "Invalid rate limit, serving without one"
            );
            router.layer(TraceLayer::new_for_http())
        }
    }
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}
