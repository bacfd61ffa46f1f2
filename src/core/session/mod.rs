//! Realtime voice session: envelopes, handshake gating, the session driver and
//! its WebSocket transport.

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod handshake;
pub mod link;
pub mod messages;

pub use client::{SessionClient, SessionHandle};
pub use config::SessionConfig;
pub use driver::{Session, SessionAction};
pub use error::{SessionError, SessionResult};
pub use handshake::{Admission, Handshake, HandshakeState};
pub use link::{AUDIO_BACKLOG_CAPACITY, LinkReceiver, Outbound, SessionLink};
pub use messages::{ClientEnvelope, ServerEnvelope};
