//! 16-bit PCM codec helpers.
//!
//! Capture produces little-endian PCM16 at 16 kHz; the remote service answers
//! with little-endian PCM16 at whatever rate it declares in the mime type
//! (`audio/pcm;rate=24000`).

use base64::prelude::*;
use regex::Regex;
use std::sync::LazyLock;

use super::device::{AudioError, AudioResult};

/// Capture sample rate accepted by the remote service.
pub const CAPTURE_SAMPLE_RATE_HZ: u32 = 16_000;

/// Mime type attached to every outbound audio frame.
pub const CAPTURE_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Rate assumed for inbound audio without a `rate=` parameter.
pub const DEFAULT_PLAYBACK_SAMPLE_RATE_HZ: u32 = 24_000;

static RATE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rate=(\d+)").expect("rate pattern is a valid regex"));

/// Quantize one float sample to i16.
///
/// Negative values scale by 32768 and non-negative by 32767 so that both -1.0
/// and +1.0 land exactly on the i16 range ends.
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    let s = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Quantize, pack little-endian and base64-encode a frame.
pub fn encode_pcm16(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&quantize_sample(sample).to_le_bytes());
    }
    BASE64_STANDARD.encode(bytes)
}

/// Decode a base64 PCM16 payload into normalized floats (`i16 / 32768`).
///
/// A trailing odd byte cannot form a sample and is ignored.
pub fn decode_pcm16(data: &str) -> AudioResult<Vec<f32>> {
    let bytes = BASE64_STANDARD
        .decode(data.trim())
        .map_err(|e| AudioError::InvalidPayload(e.to_string()))?;

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect())
}

/// Extract the `rate=` parameter from a mime type, falling back to 24 kHz.
pub fn sample_rate_from_mime(mime_type: Option<&str>) -> u32 {
    mime_type
        .and_then(|mime| RATE_PARAM.captures(mime))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|rate| *rate > 0)
        .unwrap_or(DEFAULT_PLAYBACK_SAMPLE_RATE_HZ)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_extremes() {
        assert_eq!(quantize_sample(-1.0), i16::MIN);
        assert_eq!(quantize_sample(1.0), i16::MAX);
        assert_eq!(quantize_sample(0.0), 0);
    }

    #[test]
    fn test_quantize_clamps_out_of_range() {
        assert_eq!(quantize_sample(-3.5), i16::MIN);
        assert_eq!(quantize_sample(7.0), i16::MAX);
        assert_eq!(quantize_sample(f32::NAN), 0);
    }

    #[test]
    fn test_quantize_is_asymmetric() {
        assert_eq!(quantize_sample(0.5), 16383);
        assert_eq!(quantize_sample(-0.5), -16384);
    }

    #[test]
    fn test_encode_little_endian() {
        let encoded = encode_pcm16(&[1.0, -1.0]);
        let bytes = BASE64_STANDARD.decode(encoded).unwrap();
        assert_eq!(bytes, vec![0xFF, 0x7F, 0x00, 0x80]);
    }

    #[test]
    fn test_decode_normalizes_by_32768() {
        let payload = BASE64_STANDARD.encode([0x00, 0x80, 0x00, 0x40]);
        let samples = decode_pcm16(&payload).unwrap();
        assert_eq!(samples, vec![-1.0, 0.5]);
    }

    #[test]
    fn test_decode_ignores_trailing_odd_byte() {
        let payload = BASE64_STANDARD.encode([0x00, 0x40, 0x11]);
        let samples = decode_pcm16(&payload).unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(
            decode_pcm16("not base64!!"),
            Err(AudioError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_encode_decode_within_quantization_step() {
        let input: Vec<f32> = (0..64).map(|i| ((i as f32) / 32.0) - 1.0).collect();
        let decoded = decode_pcm16(&encode_pcm16(&input)).unwrap();

        assert_eq!(decoded.len(), input.len());
        for (original, restored) in input.iter().zip(decoded.iter()) {
            assert!(
                (original - restored).abs() <= 2.0 / 32767.0,
                "{original} vs {restored}"
            );
        }
    }

    #[test]
    fn test_sample_rate_from_mime() {
        assert_eq!(sample_rate_from_mime(Some("audio/pcm;rate=16000")), 16000);
        assert_eq!(sample_rate_from_mime(Some("audio/pcm; rate=44100")), 44100);
        assert_eq!(sample_rate_from_mime(Some("audio/pcm")), 24000);
        assert_eq!(sample_rate_from_mime(Some("audio/pcm;rate=0")), 24000);
        assert_eq!(sample_rate_from_mime(None), 24000);
    }
}
