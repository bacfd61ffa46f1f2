use std::sync::Arc;

use axum::{
    extract::{State, ws::WebSocketUpgrade},
    http::{HeaderMap, header},
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use super::bridge::bridge;
use super::upstream::{ForwardedHeaders, build_upstream_url, dial_upstream};
use crate::errors::{RelayError, RelayResult};
use crate::state::AppState;

/// Relay WebSocket handler
///
/// Dials the upstream Live API first and only then accepts the client
/// upgrade, so a refused or unreachable upstream is reported as a plain HTTP
/// error. On success the two sockets are bridged until either side closes.
///
/// The origin check runs earlier, in `origin_guard_middleware`.
pub async fn relay_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> RelayResult<Response> {
    let api_key = state
        .config
        .upstream_api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(RelayError::MissingSecret)?;

    let connection_id = Uuid::new_v4();
    let forwarded = ForwardedHeaders {
        protocol: headers.get(header::SEC_WEBSOCKET_PROTOCOL).cloned(),
        origin: headers.get(header::ORIGIN).cloned(),
    };

    info!(
        connection_id = %connection_id,
        origin = ?forwarded.origin,
        protocol = ?forwarded.protocol,
        "Relay WebSocket upgrade requested"
    );

    let url = build_upstream_url(&state.config.upstream_url, api_key)?;
    let upstream = dial_upstream(&url, forwarded, state.config.upstream_connect_timeout()).await?;

    info!(
        connection_id = %connection_id,
        protocol = ?upstream.protocol,
        "Upstream connected"
    );

    let max_message_size = state.config.max_message_size;
    let mut ws = ws
        .max_message_size(max_message_size)
        .max_frame_size(max_message_size);
    if let Some(protocol) = upstream.protocol.clone() {
        ws = ws.protocols([protocol]);
    }

    Ok(ws.on_upgrade(move |socket| bridge(socket, upstream.socket, connection_id)))
}
