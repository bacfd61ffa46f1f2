//! Relay WebSocket route configuration

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::relay::relay_handler;
use crate::middleware::origin_guard_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay router
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade bridged to the Live API
///
/// Frames are passed through untouched in both directions; the client speaks
/// the Live API protocol directly (`setup`, `realtimeInput`, ...).
///
/// # Errors
///
/// - `403` when the `Origin` header is not allowed
/// - `500` when no upstream secret is configured
/// - the upstream status and body when the upstream refuses the upgrade
/// - `502` when the upstream cannot be reached
pub fn create_relay_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(relay_handler))
        .layer(middleware::from_fn_with_state(state, origin_guard_middleware))
        .layer(TraceLayer::new_for_http())
}
