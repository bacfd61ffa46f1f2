//! Microphone frame encoder.

use super::pcm::{CAPTURE_MIME_TYPE, encode_pcm16};
use crate::core::session::messages::{Blob, ClientEnvelope, RealtimeInput};

/// Turns fixed-size mono f32 frames into `realtimeInput` envelopes.
///
/// Stateless between frames apart from a counter: there is no cross-frame
/// buffer, so a frame that cannot be sent is simply lost.
#[derive(Debug, Default)]
pub struct CaptureEncoder {
    frames_encoded: u64,
}

impl CaptureEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode one frame. Samples outside `[-1, 1]` are clamped.
    pub fn encode_frame(&mut self, samples: &[f32]) -> ClientEnvelope {
        self.frames_encoded += 1;
        ClientEnvelope::RealtimeInput(RealtimeInput {
            audio: Blob {
                data: encode_pcm16(samples),
                mime_type: Some(CAPTURE_MIME_TYPE.to_string()),
            },
        })
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_frame_envelope_shape() {
        let mut encoder = CaptureEncoder::new();
        let envelope = encoder.encode_frame(&[0.0, 1.0]);

        let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "realtimeInput": {
                    "audio": { "data": "AAD/fw==", "mimeType": "audio/pcm;rate=16000" }
                }
            })
        );
        assert_eq!(encoder.frames_encoded(), 1);
    }

    #[test]
    fn test_encode_frame_clamps() {
        let mut encoder = CaptureEncoder::new();
        let loud = encoder.encode_frame(&[4.0, -4.0]);
        let clean = encoder.encode_frame(&[1.0, -1.0]);

        assert_eq!(loud, clean);
        assert_eq!(encoder.frames_encoded(), 2);
    }

    #[test]
    fn test_empty_frame() {
        let mut encoder = CaptureEncoder::new();
        match encoder.encode_frame(&[]) {
            ClientEnvelope::RealtimeInput(input) => assert!(input.audio.data.is_empty()),
            other => panic!("unexpected envelope {}", other.kind()),
        }
    }
}
