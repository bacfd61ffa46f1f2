//! WebSocket transport for a [`Session`].
//!
//! [`SessionClient::connect`] dials the relay (or the upstream directly),
//! opens the session and spawns one connection task that forwards the
//! session's outbound link to the socket and feeds inbound frames back into
//! the session.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::driver::Session;
use super::error::{SessionError, SessionResult};
use super::handshake::HandshakeState;
use super::link::{AUDIO_BACKLOG_CAPACITY, LinkReceiver, Outbound, SessionLink};
use crate::core::audio::AudioDevices;
use crate::core::tools::HostEffector;

/// How long [`SessionHandle::stop`] waits for the socket to close.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects a session to a WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct SessionClient {
    url: String,
    config: SessionConfig,
}

impl SessionClient {
    pub fn new(url: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            url: url.into(),
            config,
        }
    }

    /// Dial, send `setup` and start the connection task.
    ///
    /// Configured sub-protocols are offered in `Sec-WebSocket-Protocol`.
    pub async fn connect(
        self,
        devices: AudioDevices,
        effector: Arc<dyn HostEffector>,
    ) -> SessionResult<SessionHandle> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;

        if !self.config.protocols.is_empty() {
            let offered = HeaderValue::from_str(&self.config.protocols.join(", "))
                .map_err(|e| SessionError::ConnectionFailed(format!("Invalid sub-protocol: {e}")))?;
            request
                .headers_mut()
                .insert(http::header::SEC_WEBSOCKET_PROTOCOL, offered);
        }

        let (ws_stream, response) = connect_async(request)
            .await
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;

        debug!(
            status = %response.status(),
            protocol = ?response.headers().get(http::header::SEC_WEBSOCKET_PROTOCOL),
            "Session socket connected"
        );

        let (link, rx) = SessionLink::channel(AUDIO_BACKLOG_CAPACITY);
        let mut session = Session::new(self.config, devices, effector, link);
        session.open()?;
        info!(session_id = %session.id(), url = %self.url, "Session connected");

        let session = Arc::new(Mutex::new(session));
        let task = tokio::spawn(run_connection(ws_stream, rx, session.clone()));

        Ok(SessionHandle { session, task })
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn run_connection(
    ws_stream: WsStream,
    mut rx: LinkReceiver,
    session: Arc<Mutex<Session>>,
) {
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        error!("Failed to send session message: {}", e);
                        break;
                    }
                }
                Some(Outbound::Close) => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!("Close frame not sent: {}", e);
                    }
                    break;
                }
                None => break,
            },

            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    session.lock().await.handle_text(text.as_str());
                }
                Some(Ok(Message::Binary(data))) => {
                    session.lock().await.handle_binary(&data);
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        error!("Failed to send pong: {}", e);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(
                        close_code = ?frame.as_ref().map(|f| u16::from(f.code)),
                        "Session socket closed by peer"
                    );
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Session socket error: {}", e);
                    break;
                }
                None => break,
            },
        }
    }

    session.lock().await.on_transport_closed();
}

/// Handle to a connected session.
#[derive(Debug)]
pub struct SessionHandle {
    session: Arc<Mutex<Session>>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Shared access to the session, e.g. for a capture callback.
    pub fn session(&self) -> Arc<Mutex<Session>> {
        self.session.clone()
    }

    pub async fn state(&self) -> HandshakeState {
        self.session.lock().await.state()
    }

    pub async fn push_capture_frame(&self, samples: &[f32]) -> bool {
        self.session.lock().await.push_capture_frame(samples)
    }

    pub async fn send_text(&self, text: &str) -> SessionResult<()> {
        self.session.lock().await.send_text(text)
    }

    /// Whether the connection task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the peer to end the session.
    pub async fn closed(self) {
        if let Err(e) = self.task.await {
            error!("Session connection task failed: {}", e);
        }
    }

    /// Close the session and wait for the socket to shut down.
    pub async fn stop(self) {
        self.session.lock().await.close();

        let mut task = self.task;
        if tokio::time::timeout(STOP_TIMEOUT, &mut task).await.is_err() {
            warn!("Session socket did not close in time, aborting");
            task.abort();
        }
    }
}
