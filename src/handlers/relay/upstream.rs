//! Upstream dialing.
//!
//! The upstream socket is opened before the client upgrade is accepted, so
//! every dial failure can still be answered with an ordinary HTTP response.

use std::time::Duration;

use axum::http::{HeaderValue, header};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};
use url::Url;

use crate::errors::{RelayError, RelayResult};

pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected upstream socket
pub struct UpstreamConnection {
    pub socket: UpstreamSocket,
    /// Sub-protocol the upstream selected, if any
    pub protocol: Option<String>,
}

impl std::fmt::Debug for UpstreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConnection")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

/// Headers copied from the client's upgrade request
#[derive(Debug, Clone, Default)]
pub struct ForwardedHeaders {
    pub protocol: Option<HeaderValue>,
    pub origin: Option<HeaderValue>,
}

/// Append the secret to the endpoint as the `key` query parameter.
pub fn build_upstream_url(endpoint: &str, api_key: &str) -> RelayResult<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| RelayError::InvalidUpstreamRequest(format!("Invalid upstream URL: {e}")))?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

/// Open the upstream WebSocket.
///
/// A non-101 answer becomes [`RelayError::UpstreamRejected`] with the
/// upstream status and body; anything else that prevents the handshake
/// (refused, DNS, TLS, timeout) becomes [`RelayError::UpstreamUnavailable`].
pub async fn dial_upstream(
    url: &Url,
    forwarded: ForwardedHeaders,
    connect_timeout: Duration,
) -> RelayResult<UpstreamConnection> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| RelayError::InvalidUpstreamRequest(e.to_string()))?;

    let headers = request.headers_mut();
    if let Some(protocol) = forwarded.protocol {
        headers.insert(header::SEC_WEBSOCKET_PROTOCOL, protocol);
    }
    if let Some(origin) = forwarded.origin {
        headers.insert(header::ORIGIN, origin);
    }

    let (socket, response) = match tokio::time::timeout(connect_timeout, connect_async(request)).await
    {
        Ok(Ok(connected)) => connected,
        Ok(Err(tungstenite::Error::Http(response))) => {
            let body = response
                .body()
                .as_ref()
                .map(|body| String::from_utf8_lossy(body).into_owned())
                .unwrap_or_default();
            return Err(RelayError::UpstreamRejected {
                status: response.status(),
                body,
            });
        }
        Ok(Err(e)) => return Err(RelayError::UpstreamUnavailable(e.to_string())),
        Err(_) => {
            return Err(RelayError::UpstreamUnavailable(format!(
                "no handshake within {}s",
                connect_timeout.as_secs_f32()
            )));
        }
    };

    let protocol = response
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    Ok(UpstreamConnection { socket, protocol })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_appended() {
        let url = build_upstream_url("wss://upstream.example/live", "abc").unwrap();
        assert_eq!(url.as_str(), "wss://upstream.example/live?key=abc");
    }

    #[test]
    fn test_key_is_encoded_and_existing_query_kept() {
        let url = build_upstream_url("wss://upstream.example/live?alt=json", "a b&c").unwrap();
        assert_eq!(url.as_str(), "wss://upstream.example/live?alt=json&key=a+b%26c");
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            build_upstream_url("not a url", "abc"),
            Err(RelayError::InvalidUpstreamRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_refused_dial_is_unavailable() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = build_upstream_url(&format!("ws://{addr}/live"), "abc").unwrap();
        let result = dial_upstream(&url, ForwardedHeaders::default(), Duration::from_secs(2)).await;
        assert!(matches!(result, Err(RelayError::UpstreamUnavailable(_))));
    }
}
