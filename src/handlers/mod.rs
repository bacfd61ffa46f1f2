//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `relay` - WebSocket relay to the Live API

pub mod api;
pub mod relay;

pub use relay::relay_handler;
