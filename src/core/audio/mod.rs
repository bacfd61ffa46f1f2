//! Audio pipeline: PCM16 codec, capture encoder, playback scheduler and the
//! device seams hosts implement.

pub mod capture;
pub mod device;
pub mod pcm;
pub mod playback;

pub use capture::CaptureEncoder;
pub use device::{AudioDevices, AudioError, AudioInput, AudioOutput, AudioResult, PushInput};
pub use pcm::{
    CAPTURE_MIME_TYPE, CAPTURE_SAMPLE_RATE_HZ, DEFAULT_PLAYBACK_SAMPLE_RATE_HZ, decode_pcm16,
    encode_pcm16, quantize_sample, sample_rate_from_mime,
};
pub use playback::{PlaybackScheduler, ScheduledChunk};
