//! Bidirectional passthrough between the client and upstream sockets.
//!
//! Text and binary frames are forwarded as-is. Control frames are answered by
//! each socket's own library and never crossed over. What happens on close or
//! error is decided by [`route_event`], which knows nothing about sockets.
//!
//! A peer that disappears without a close frame counts as closing with 1006,
//! not as a socket error.

use std::error::Error as StdError;

use axum::extract::ws::{self, WebSocket};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{
    self,
    error::ProtocolError,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::close::{
    ABNORMAL_CLOSURE, CLIENT_ERROR_REASON, INTERNAL_ERROR, UPSTREAM_ERROR_REASON,
    propagated_close_code, received_close_code,
};
use super::upstream::UpstreamSocket;

/// One end of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Upstream,
}

impl Side {
    pub fn peer(self) -> Side {
        match self {
            Side::Client => Side::Upstream,
            Side::Upstream => Side::Client,
        }
    }

    fn error_reason(self) -> &'static str {
        match self {
            Side::Client => CLIENT_ERROR_REASON,
            Side::Upstream => UPSTREAM_ERROR_REASON,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Upstream => "upstream",
        }
    }
}

/// A data frame carried across the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Text(String),
    Binary(Bytes),
}

/// Something observed on one side of the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Frame(RelayFrame),
    /// Ping or pong, handled by the socket itself
    Control,
    Closed { code: Option<u16>, reason: String },
    /// The stream ended without a close frame
    Ended,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    Forward { to: Side, frame: RelayFrame },
    Close { to: Side, code: u16, reason: String },
    Ignore,
}

/// Decide what to do with an event observed on `from`.
pub fn route_event(from: Side, event: RelayEvent) -> RelayAction {
    match event {
        RelayEvent::Frame(frame) => RelayAction::Forward {
            to: from.peer(),
            frame,
        },
        RelayEvent::Control => RelayAction::Ignore,
        RelayEvent::Closed { code, reason } => {
            let propagated = propagated_close_code(code);
            RelayAction::Close {
                to: from.peer(),
                code: propagated,
                reason: if Some(propagated) == code {
                    reason
                } else {
                    String::new()
                },
            }
        }
        RelayEvent::Ended => RelayAction::Close {
            to: from.peer(),
            code: propagated_close_code(None),
            reason: String::new(),
        },
        RelayEvent::Error(_) => RelayAction::Close {
            to: from.peer(),
            code: INTERNAL_ERROR,
            reason: from.error_reason().to_string(),
        },
    }
}

/// Whether `error` is the peer vanishing without a close handshake rather
/// than an I/O fault.
fn is_dropped_connection(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if let Some(ws_error) = e.downcast_ref::<tungstenite::Error>() {
            return matches!(
                ws_error,
                tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
            );
        }
        current = e.source();
    }
    false
}

fn closed_event(code: u16, reason: &str) -> RelayEvent {
    RelayEvent::Closed {
        code: received_close_code(code, reason),
        reason: reason.to_owned(),
    }
}

fn error_event(error: &(dyn StdError + 'static)) -> RelayEvent {
    if is_dropped_connection(error) {
        RelayEvent::Closed {
            code: Some(ABNORMAL_CLOSURE),
            reason: String::new(),
        }
    } else {
        RelayEvent::Error(error.to_string())
    }
}

fn client_event(message: Option<Result<ws::Message, axum::Error>>) -> RelayEvent {
    match message {
        Some(Ok(ws::Message::Text(text))) => {
            RelayEvent::Frame(RelayFrame::Text(text.as_str().to_owned()))
        }
        Some(Ok(ws::Message::Binary(data))) => RelayEvent::Frame(RelayFrame::Binary(data)),
        Some(Ok(ws::Message::Ping(_) | ws::Message::Pong(_))) => RelayEvent::Control,
        Some(Ok(ws::Message::Close(Some(frame)))) => {
            closed_event(frame.code, frame.reason.as_str())
        }
        Some(Ok(ws::Message::Close(None))) => RelayEvent::Closed {
            code: None,
            reason: String::new(),
        },
        Some(Err(e)) => error_event(&e),
        None => RelayEvent::Ended,
    }
}

fn upstream_event(
    message: Option<Result<tungstenite::Message, tungstenite::Error>>,
) -> RelayEvent {
    match message {
        Some(Ok(tungstenite::Message::Text(text))) => {
            RelayEvent::Frame(RelayFrame::Text(text.as_str().to_owned()))
        }
        Some(Ok(tungstenite::Message::Binary(data))) => {
            RelayEvent::Frame(RelayFrame::Binary(data))
        }
        Some(Ok(tungstenite::Message::Close(Some(frame)))) => {
            closed_event(u16::from(frame.code), frame.reason.as_str())
        }
        Some(Ok(tungstenite::Message::Close(None))) => RelayEvent::Closed {
            code: None,
            reason: String::new(),
        },
        Some(Ok(_)) => RelayEvent::Control,
        Some(Err(e)) => error_event(&e),
        None => RelayEvent::Ended,
    }
}

fn to_client_message(frame: RelayFrame) -> ws::Message {
    match frame {
        RelayFrame::Text(text) => ws::Message::Text(text.into()),
        RelayFrame::Binary(data) => ws::Message::Binary(data),
    }
}

fn to_upstream_message(frame: RelayFrame) -> tungstenite::Message {
    match frame {
        RelayFrame::Text(text) => tungstenite::Message::Text(text.into()),
        RelayFrame::Binary(data) => tungstenite::Message::Binary(data),
    }
}

/// Pump frames between the two sockets until either side closes or fails.
pub async fn bridge(client: WebSocket, upstream: UpstreamSocket, connection_id: Uuid) {
    info!(connection_id = %connection_id, "Relay bridge established");

    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let mut forwarded: u64 = 0;

    loop {
        let (from, event) = tokio::select! {
            message = client_rx.next() => (Side::Client, client_event(message)),
            message = upstream_rx.next() => (Side::Upstream, upstream_event(message)),
        };

        if let RelayEvent::Error(ref e) = event {
            warn!(connection_id = %connection_id, side = from.as_str(), "Socket error: {}", e);
        }

        let (to, code, reason) = match route_event(from, event) {
            RelayAction::Ignore => continue,
            RelayAction::Forward { to, frame } => {
                let sent = match to {
                    Side::Client => client_tx
                        .send(to_client_message(frame))
                        .await
                        .map_err(|e| e.to_string()),
                    Side::Upstream => upstream_tx
                        .send(to_upstream_message(frame))
                        .await
                        .map_err(|e| e.to_string()),
                };
                match sent {
                    Ok(()) => {
                        forwarded += 1;
                        continue;
                    }
                    // A failed write is an error on the receiving side
                    Err(e) => {
                        warn!(connection_id = %connection_id, side = to.as_str(), "Socket write failed: {}", e);
                        match route_event(to, RelayEvent::Error(e)) {
                            RelayAction::Close { to, code, reason } => (to, code, reason),
                            _ => break,
                        }
                    }
                }
            }
            RelayAction::Close { to, code, reason } => (to, code, reason),
        };

        info!(
            connection_id = %connection_id,
            closed_by = to.peer().as_str(),
            close_code = code,
            "Closing relay bridge"
        );

        match to {
            Side::Client => {
                let frame = ws::CloseFrame {
                    code,
                    reason: reason.into(),
                };
                if let Err(e) = client_tx.send(ws::Message::Close(Some(frame))).await {
                    debug!("Client close frame not sent: {}", e);
                }
                // Flush the reply to the upstream's close
                if let Err(e) = upstream_tx.close().await {
                    debug!("Upstream socket close failed: {}", e);
                }
            }
            Side::Upstream => {
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: reason.into(),
                };
                if let Err(e) = upstream_tx
                    .send(tungstenite::Message::Close(Some(frame)))
                    .await
                {
                    debug!("Upstream close frame not sent: {}", e);
                }
                if let Err(e) = client_tx.close().await {
                    debug!("Client socket close failed: {}", e);
                }
            }
        }
        break;
    }

    info!(connection_id = %connection_id, forwarded, "Relay bridge closed");
}
