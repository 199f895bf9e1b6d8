//! Axum router construction for the history API.
//!
//! Assembles all routes into a single [`Router`] with CORS middleware
//! enabled for cross-origin UI access and request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the history API.
///
/// The router includes:
/// - `GET /api/events` -- paginated event history
/// - `DELETE /api/events/cleanup` -- user-triggered deletion
/// - `GET /api/session` -- bound session status
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/events", get(handlers::list_events))
        .route("/api/events/cleanup", delete(handlers::cleanup_events))
        .route("/api/session", get(handlers::session_status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
