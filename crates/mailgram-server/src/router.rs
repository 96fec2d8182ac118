//! Router configuration and server setup.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::handlers;
use crate::state::AppState;

/// Creates the router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/gmail/push", post(handlers::gmail_push))
        .route("/gmail/resubscribe", post(handlers::resubscribe))
        .route("/digest/:period", post(handlers::digest))
        .layer(cors)
        .with_state(state)
}

/// Starts the server.
pub async fn serve(state: AppState) -> Result<(), std::io::Error> {
    let addr = state.config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Mailgram server listening on {}", addr);
    axum::serve(listener, create_router(state)).await
}
