//! WebSocket relay to the Live API
//!
//! - `handler` - upgrade endpoint
//! - `upstream` - upstream URL and dialing
//! - `bridge` - frame passthrough between the two sockets
//! - `close` - close-code policy

pub mod bridge;
pub mod close;
pub mod handler;
pub mod upstream;

pub use bridge::{RelayAction, RelayEvent, RelayFrame, Side, bridge, route_event};
pub use close::propagated_close_code;
pub use handler::relay_handler;
pub use upstream::{ForwardedHeaders, UpstreamConnection, build_upstream_url, dial_upstream};
