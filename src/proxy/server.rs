//! HTTP server setup and configuration.

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::config::{Config, ServerConfig};
use crate::relay::RelayDriver;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub driver: RelayDriver,
    pub config: Arc<Config>,
}

/// Build the CORS policy from the configured origins.
///
/// A `"*"` entry allows any origin. Credentials are never allowed, since
/// browsers reject them alongside a wildcard origin.
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if server.cors_allow_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_allow_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server);

    Router::new()
        .route("/call-api", post(handlers::call_api))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();

    let driver = RelayDriver::new(&config.upstream)?;

    tracing::info!(
        upstream = %config.upstream.url,
        headers = config.upstream.headers.len(),
        connect_timeout_secs = config.upstream.connect_timeout_secs,
        read_timeout_secs = config.upstream.read_timeout_secs,
        default_mode = config.relay.mode.as_str(),
        "Relay configured"
    );

    let state = AppState {
        driver,
        config: Arc::new(config),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting prompt-relay server");

    axum::serve(listener, app).await?;

    Ok(())
}
