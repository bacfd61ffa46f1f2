//! Audio device seams.
//!
//! The session never talks to a sound card directly. Hosts plug in a capture
//! device (microphone) and an output device (speaker) that expose a monotonic
//! device clock in seconds. Playback scheduling is computed against that clock.

use thiserror::Error;

/// Errors raised by audio devices or the PCM codec.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Base64 payload could not be decoded
    #[error("Invalid audio payload: {0}")]
    InvalidPayload(String),

    /// The device could not be opened or reconfigured
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device rejected a scheduled buffer
    #[error("Audio scheduling failed: {0}")]
    SchedulingFailed(String),

    /// The device was already closed
    #[error("Audio device closed")]
    Closed,
}

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Output device with its own clock.
///
/// `current_time` is measured in seconds from the moment the device was last
/// (re)initialized, so it restarts near zero after [`AudioOutput::reinitialize`].
pub trait AudioOutput: Send {
    /// Sample rate the device is currently running at.
    fn sample_rate(&self) -> u32;

    /// Current device clock in seconds.
    fn current_time(&self) -> f64;

    /// Tear down and reopen the device at a new sample rate.
    fn reinitialize(&mut self, sample_rate: u32) -> AudioResult<()>;

    /// Commit mono samples to start playing at `start_at` (device seconds).
    fn schedule(&mut self, start_at: f64, samples: Vec<f32>, sample_rate: u32) -> AudioResult<()>;

    /// Release the device. Buffers already committed may be cut short.
    fn close(&mut self);
}

/// Capture device (microphone).
///
/// Frames are pushed by the host into the session; the device itself only needs
/// to be started after the handshake completes and stopped on teardown.
pub trait AudioInput: Send {
    /// Start delivering frames.
    fn start(&mut self) -> AudioResult<()>;

    /// Stop delivering frames and release the device.
    fn stop(&mut self);
}

/// Capture device for hosts that push frames without any device lifecycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct PushInput;

impl AudioInput for PushInput {
    fn start(&mut self) -> AudioResult<()> {
        Ok(())
    }

    fn stop(&mut self) {}
}

/// The audio-device pair owned by a single session.
pub struct AudioDevices {
    pub input: Box<dyn AudioInput>,
    pub output: Box<dyn AudioOutput>,
}

impl AudioDevices {
    pub fn new(input: Box<dyn AudioInput>, output: Box<dyn AudioOutput>) -> Self {
        Self { input, output }
    }
}
