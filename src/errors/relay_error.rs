use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Body sent when the upstream answers a dial with neither 101 nor a body.
pub const UPSTREAM_NO_UPGRADE_BODY: &str = "Upstream did not upgrade.";

/// Errors the relay returns to the client before a WebSocket upgrade
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Origin not allowed: {0}")]
    OriginNotAllowed(String),

    #[error("Missing GEMINI_API_KEY")]
    MissingSecret,

    /// The upstream answered the dial with a non-101 status
    #[error("Upstream rejected the connection with status {status}")]
    UpstreamRejected { status: StatusCode, body: String },

    #[error("Upstream connection failed: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid upstream request: {0}")]
    InvalidUpstreamRequest(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            RelayError::MissingSecret | RelayError::InvalidUpstreamRequest(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RelayError::UpstreamRejected { status, .. } => *status,
            RelayError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Plain-text body returned to the client. Origin failures never echo the origin.
    fn body(&self) -> String {
        match self {
            RelayError::OriginNotAllowed(_) => "Unauthorized".to_string(),
            RelayError::UpstreamRejected { body, .. } if body.is_empty() => {
                UPSTREAM_NO_UPGRADE_BODY.to_string()
            }
            RelayError::UpstreamRejected { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            RelayError::OriginNotAllowed(origin) => {
                tracing::warn!(origin = %origin, "Rejected WebSocket upgrade from disallowed origin");
            }
            RelayError::UpstreamRejected { status, .. } => {
                tracing::warn!(status = %status, "Upstream refused WebSocket upgrade");
            }
            other => tracing::error!("Relay request failed: {}", other),
        }
        (status, self.body()).into_response()
    }
}
