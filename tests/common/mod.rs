//! Shared fixtures for relay and session integration tests
//!
//! - `MockUpstream`: a tokio-tungstenite server standing in for the Live API
//! - `spawn_relay`: the real axum router on an ephemeral port
//! - `raw_upgrade`: a hand-written upgrade request for asserting error bodies

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{StatusCode, header};

use voice_guide_gateway::{ServerConfig, routes, state::AppState};

pub const TEST_API_KEY: &str = "test-key";
pub const WAIT: Duration = Duration::from_secs(5);

/// What the mock upstream saw in one upgrade request
#[derive(Debug, Clone)]
pub struct HandshakeRecord {
    pub uri: String,
    pub protocol: Option<String>,
    pub origin: Option<String>,
}

/// One accepted upstream socket, driven by the test
pub struct MockConnection {
    pub incoming: mpsc::UnboundedReceiver<Message>,
    pub outgoing: mpsc::UnboundedSender<Message>,
}

impl MockConnection {
    pub fn send_text(&self, text: &str) {
        self.outgoing
            .send(Message::Text(text.to_string().into()))
            .unwrap();
    }

    pub fn send_json(&self, value: &Value) {
        self.send_text(&value.to_string());
    }

    pub async fn next_message(&mut self) -> Message {
        timeout(WAIT, self.incoming.recv())
            .await
            .expect("timed out waiting for upstream message")
            .expect("upstream connection ended")
    }

    /// Next text frame from the client, parsed as JSON
    pub async fn next_json(&mut self) -> Value {
        loop {
            match self.next_message().await {
                Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                Message::Binary(data) => return serde_json::from_slice(&data).unwrap(),
                Message::Close(frame) => panic!("connection closed: {frame:?}"),
                _ => continue,
            }
        }
    }

    /// Assert nothing arrives for `window`
    pub async fn assert_silent(&mut self, window: Duration) {
        if let Ok(Some(message)) = timeout(window, self.incoming.recv()).await {
            panic!("unexpected upstream message: {message:?}");
        }
    }
}

/// Stand-in for the Live API endpoint
pub struct MockUpstream {
    pub addr: SocketAddr,
    handshakes: Arc<Mutex<Vec<HandshakeRecord>>>,
    connections: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    /// An upstream that answers every upgrade with `status` and `body`
    pub async fn rejecting(status: u16, body: &str) -> Self {
        Self::start_with(Some((status, body.to_string()))).await
    }

    async fn start_with(reject: Option<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handshakes = Arc::new(Mutex::new(Vec::new()));
        let (connections_tx, connections) = mpsc::unbounded_channel();

        let records = handshakes.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let records = records.clone();
                let reject = reject.clone();
                let connections_tx = connections_tx.clone();
                tokio::spawn(async move {
                    if let Some(connection) = accept(stream, records, reject).await {
                        let _ = connections_tx.send(connection);
                    }
                });
            }
        });

        Self {
            addr,
            handshakes,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/live", self.addr)
    }

    pub fn handshakes(&self) -> Vec<HandshakeRecord> {
        self.handshakes.lock().unwrap().clone()
    }

    pub async fn next_connection(&mut self) -> MockConnection {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("timed out waiting for upstream connection")
            .expect("mock upstream stopped")
    }
}

async fn accept(
    stream: TcpStream,
    records: Arc<Mutex<Vec<HandshakeRecord>>>,
    reject: Option<(u16, String)>,
) -> Option<MockConnection> {
    let callback = move |request: &Request, mut response: Response| {
        let header_str = |name| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let protocol = header_str(header::SEC_WEBSOCKET_PROTOCOL);
        records.lock().unwrap().push(HandshakeRecord {
            uri: request.uri().to_string(),
            protocol: protocol.clone(),
            origin: header_str(header::ORIGIN),
        });

        if let Some((status, body)) = reject {
            let mut error = ErrorResponse::new(Some(body));
            *error.status_mut() = StatusCode::from_u16(status).unwrap();
            return Err(error);
        }

        // Select the first offered sub-protocol
        if let Some(first) = protocol.as_deref().and_then(|p| p.split(',').next()) {
            response
                .headers_mut()
                .insert(header::SEC_WEBSOCKET_PROTOCOL, first.trim().parse().unwrap());
        }
        Ok(response)
    };

    let socket = accept_hdr_async(stream, callback).await.ok()?;
    let (mut sink, mut source) = socket.split();
    let (incoming_tx, incoming) = mpsc::unbounded_channel();
    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        while let Some(Ok(message)) = source.next().await {
            if incoming_tx.send(message).is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    Some(MockConnection { incoming, outgoing })
}

/// Relay configuration pointing at `upstream_url`
pub fn relay_config(upstream_url: &str) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.upstream_url = upstream_url.to_string();
    config.upstream_api_key = Some(TEST_API_KEY.to_string());
    config.upstream_connect_timeout_seconds = 5;
    config
}

/// Serve the application router on an ephemeral port
pub async fn spawn_relay(config: ServerConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::create_app_router(AppState::new(config));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Send a WebSocket upgrade request by hand and read the HTTP answer.
///
/// Returns the status code and, for non-101 answers, the body.
pub async fn raw_upgrade(addr: SocketAddr, origin: Option<&str>) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut request = format!(
        "GET /ws HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n"
    );
    if let Some(origin) = origin {
        request.push_str(&format!("Origin: {origin}\r\n"));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut reader = BufReader::new(stream);
    let mut status_line = String::new();
    timeout(WAIT, reader.read_line(&mut status_line))
        .await
        .unwrap()
        .unwrap();
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("malformed status line");

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().unwrap();
        }
    }

    if status == 101 {
        return (status, String::new());
    }

    let mut body = vec![0u8; content_length];
    timeout(WAIT, reader.read_exact(&mut body))
        .await
        .unwrap()
        .unwrap();
    (status, String::from_utf8(body).unwrap())
}
