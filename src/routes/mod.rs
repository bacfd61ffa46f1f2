pub mod api;
pub mod relay;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Combine the public and relay routes into the application router
pub fn create_app_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(relay::create_relay_router(state.clone()))
        .with_state(state)
}
