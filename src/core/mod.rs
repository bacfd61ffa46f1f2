pub mod audio;
pub mod session;
pub mod tools;

// Re-export commonly used types for convenience
pub use audio::{
    AudioDevices, AudioError, AudioInput, AudioOutput, CaptureEncoder, PlaybackScheduler,
};
pub use session::{
    ClientEnvelope, HandshakeState, ServerEnvelope, Session, SessionClient, SessionConfig,
    SessionError, SessionHandle, SessionResult,
};
pub use tools::{HostEffector, ToolDispatcher, ToolError, ToolResult};
