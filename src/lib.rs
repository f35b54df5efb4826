pub mod auth;
pub mod config;
pub mod cors;
pub mod error;
pub mod headers;
pub mod proxy;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::proxy::{relay_handler, RelayState};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Initialize the relay server
pub async fn init_relay(config: RelayConfig) -> Result<()> {
    // Validate configuration
    config.validate()?;

    info!("Starting HTTP forwarding relay");
    info!(
        "Server listening on {}:{}",
        config.server.host, config.server.port
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create relay state
    let relay_state = RelayState::new(config)?;

    // Every method and path, including the root, reaches the handler
    let app = Router::new()
        .fallback(relay_handler)
        .with_state(relay_state)
        .layer(TraceLayer::new_for_http());

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(crate::error::RelayError::Io)?;

    info!("Relay ready to accept connections");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::RelayError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay=debug,tower_http=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
