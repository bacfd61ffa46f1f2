//! Close-code policy for the bridge.

/// Normal closure
pub const NORMAL_CLOSURE: u16 = 1000;
/// Sent to the peer of a side whose socket failed
pub const INTERNAL_ERROR: u16 = 1011;
/// Assumed when a connection drops without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// What tungstenite reports in place of a close code it refuses to accept
const PROTOCOL_ERROR: u16 = 1002;
const PROTOCOL_VIOLATION_REASON: &str = "Protocol violation";

pub const CLIENT_ERROR_REASON: &str = "Client socket error";
pub const UPSTREAM_ERROR_REASON: &str = "Upstream socket error";

/// Codes that may appear on the wire: 1000–4999 except the reserved
/// 1005 (no status), 1006 (abnormal) and 1015 (TLS failure).
pub fn is_sendable_close_code(code: u16) -> bool {
    (1000..=4999).contains(&code) && !matches!(code, 1005 | 1006 | 1015)
}

/// Code to send to the other side after one side closed with `code`.
///
/// A missing or non-sendable code becomes 1000.
pub fn propagated_close_code(code: Option<u16>) -> u16 {
    match code {
        Some(code) if is_sendable_close_code(code) => code,
        _ => NORMAL_CLOSURE,
    }
}

/// Close code as sent by the peer, from the frame the socket library handed up.
///
/// tungstenite swaps any code it does not allow on the wire (1004-1006, 1015,
/// 1016-2999) for `1002 "Protocol violation"`. That frame carries no usable
/// code, so it reads as `None`.
pub fn received_close_code(code: u16, reason: &str) -> Option<u16> {
    if code == PROTOCOL_ERROR && reason == PROTOCOL_VIOLATION_REASON {
        None
    } else {
        Some(code)
    }
}
