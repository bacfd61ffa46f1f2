//! Gapless playback scheduling.
//!
//! The scheduler keeps a single watermark, the playback cursor, measured on the
//! output device's clock. Each decoded chunk starts at `max(cursor, now)` and
//! pushes the cursor forward by its own duration, so chunks that arrive in a
//! burst ahead of real time still play back to back without overlapping.
//!
//! The cursor only moves backwards on an explicit interruption, or when the
//! device is reinitialized for a different sample rate (its clock restarts).

use tracing::{debug, info};

use super::device::{AudioError, AudioOutput, AudioResult};
use super::pcm::{decode_pcm16, sample_rate_from_mime};
use crate::core::session::messages::Blob;

/// Placement of one chunk on the device clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChunk {
    /// Device time the chunk starts playing, in seconds
    pub start_at: f64,
    /// Chunk length in seconds
    pub duration: f64,
    pub sample_rate: u32,
    /// Whether the device had to be reopened for this chunk's rate
    pub reinitialized: bool,
}

impl ScheduledChunk {
    pub fn end_at(&self) -> f64 {
        self.start_at + self.duration
    }
}

/// Schedules inbound PCM chunks on an [`AudioOutput`].
pub struct PlaybackScheduler {
    output: Box<dyn AudioOutput>,
    cursor: f64,
    closed: bool,
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("sample_rate", &self.output.sample_rate())
            .field("cursor", &self.cursor)
            .field("closed", &self.closed)
            .finish()
    }
}

impl PlaybackScheduler {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            cursor: 0.0,
            closed: false,
        }
    }

    /// Current watermark in device seconds.
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn sample_rate(&self) -> u32 {
        self.output.sample_rate()
    }

    /// Decode an inline-data blob and queue it behind everything already
    /// scheduled. Returns `None` for a payload with no whole samples.
    pub fn schedule(&mut self, blob: &Blob) -> AudioResult<Option<ScheduledChunk>> {
        if self.closed {
            return Err(AudioError::Closed);
        }

        let samples = decode_pcm16(&blob.data)?;
        if samples.is_empty() {
            return Ok(None);
        }
        let sample_rate = sample_rate_from_mime(blob.mime_type.as_deref());

        let reinitialized = self.output.sample_rate() != sample_rate;
        if reinitialized {
            info!(
                from = self.output.sample_rate(),
                to = sample_rate,
                "Reinitializing output device for new sample rate"
            );
            self.output.reinitialize(sample_rate)?;
            self.reset();
        }

        let now = self.output.current_time();
        let start_at = self.cursor.max(now);
        let duration = samples.len() as f64 / sample_rate as f64;

        self.output.schedule(start_at, samples, sample_rate)?;
        self.cursor = start_at + duration;

        debug!(start_at, duration, sample_rate, "Scheduled playback chunk");

        Ok(Some(ScheduledChunk {
            start_at,
            duration,
            sample_rate,
            reinitialized,
        }))
    }

    /// Abandon the queued continuation: the next chunk starts no earlier than
    /// the device's current time. Buffers already committed keep playing.
    pub fn interrupt(&mut self) {
        if self.closed {
            return;
        }
        let now = self.output.current_time();
        debug!(previous_cursor = self.cursor, now, "Playback interrupted");
        self.cursor = now;
    }

    /// Return the cursor to the device clock's zero point.
    pub fn reset(&mut self) {
        self.cursor = 0.0;
    }

    /// Release the output device. Later chunks are rejected.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.output.close();
        self.closed = true;
        self.cursor = 0.0;
    }
}
