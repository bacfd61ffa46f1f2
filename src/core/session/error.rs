use thiserror::Error;

use super::handshake::HandshakeState;
use crate::core::audio::AudioError;

/// Errors raised while driving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Handshake transition not allowed from the current state
    #[error("Invalid handshake transition from {from} to {to}")]
    InvalidTransition {
        from: HandshakeState,
        to: HandshakeState,
    },

    /// Connection to the relay or upstream failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The outbound channel is not open
    #[error("Not connected")]
    NotConnected,

    /// The audio backlog is full; the microphone frame was dropped
    #[error("Audio backlog full")]
    ChannelFull,

    /// Inbound frame could not be parsed
    #[error("Protocol parse error: {0}")]
    ProtocolParse(String),

    /// Outbound envelope could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Audio device failure
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
