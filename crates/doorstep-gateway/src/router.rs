use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::SharedState;
use crate::ws;

/// Build the application router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(api::open_session))
        .route("/api/sessions/{key}", delete(api::close_session))
        .route("/api/sessions/{key}/messages", post(api::submit_message))
        .route("/api/sessions/{key}/transcript", get(api::session_transcript))
        .route("/api/sessions/{key}/ws", get(ws::ws_handler))
        .route("/webhooks/telegram", post(api::telegram_webhook))
        // The widget is embedded in a statically hosted page.
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
