//! Outbound side of a session's socket.
//!
//! The session never writes to the socket itself. It pushes serialized frames
//! into a FIFO that a writer task drains; the link also carries the
//! "channel open" flag that gates audio frames and tool responses.
//!
//! Setup, text turns and tool responses are always queued. Microphone frames
//! are shed once [`AUDIO_BACKLOG_CAPACITY`] of them are waiting on the writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tracing::warn;

use super::error::{SessionError, SessionResult};
use super::messages::ClientEnvelope;

/// Audio frames allowed to wait behind the writer.
pub const AUDIO_BACKLOG_CAPACITY: usize = 256;

/// A frame for the socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

#[derive(Debug)]
enum Queued {
    Control(String),
    Audio(String),
    Close,
}

/// Cloneable handle to a session's outbound channel.
#[derive(Debug, Clone)]
pub struct SessionLink {
    tx: mpsc::UnboundedSender<Queued>,
    open: Arc<AtomicBool>,
    queued_audio: Arc<AtomicUsize>,
    audio_capacity: usize,
}

/// The writer's end of a [`SessionLink`].
#[derive(Debug)]
pub struct LinkReceiver {
    rx: mpsc::UnboundedReceiver<Queued>,
    queued_audio: Arc<AtomicUsize>,
}

impl LinkReceiver {
    pub async fn recv(&mut self) -> Option<Outbound> {
        let queued = self.rx.recv().await?;
        Some(self.release(queued))
    }

    pub fn try_recv(&mut self) -> Result<Outbound, mpsc::error::TryRecvError> {
        let queued = self.rx.try_recv()?;
        Ok(self.release(queued))
    }

    fn release(&self, queued: Queued) -> Outbound {
        match queued {
            Queued::Control(text) => Outbound::Text(text),
            Queued::Audio(text) => {
                self.queued_audio.fetch_sub(1, Ordering::AcqRel);
                Outbound::Text(text)
            }
            Queued::Close => Outbound::Close,
        }
    }
}

impl SessionLink {
    /// Create a link and the receiver its writer drains.
    ///
    /// `audio_capacity` bounds only the microphone backlog.
    pub fn channel(audio_capacity: usize) -> (Self, LinkReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queued_audio = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                open: Arc::new(AtomicBool::new(true)),
                queued_audio: queued_audio.clone(),
                audio_capacity,
            },
            LinkReceiver { rx, queued_audio },
        )
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Serialize and queue an envelope without waiting.
    ///
    /// Fails with [`SessionError::NotConnected`] when the link is closed. A
    /// `realtimeInput` frame fails with [`SessionError::ChannelFull`] when the
    /// audio backlog is full; other envelopes are never shed.
    pub fn send(&self, envelope: &ClientEnvelope) -> SessionResult<()> {
        if !self.is_open() {
            return Err(SessionError::NotConnected);
        }
        let text = envelope.to_json()?;

        let queued = if let ClientEnvelope::RealtimeInput(_) = envelope {
            let capacity = self.audio_capacity;
            let reserved = self
                .queued_audio
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < capacity).then_some(n + 1)
                });
            if reserved.is_err() {
                warn!(kind = envelope.kind(), "Audio backlog full, dropping frame");
                return Err(SessionError::ChannelFull);
            }
            Queued::Audio(text)
        } else {
            Queued::Control(text)
        };

        self.tx.send(queued).map_err(|_| {
            self.mark_closed();
            SessionError::NotConnected
        })
    }

    /// Mark closed without notifying the writer (the socket is already gone).
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Ask the writer to close the socket and mark the link closed.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.tx.send(Queued::Close);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::CaptureEncoder;
    use crate::core::session::messages::ClientContent;

    fn hello() -> ClientEnvelope {
        ClientEnvelope::ClientContent(ClientContent::user_text("hello"))
    }

    fn mic_frame() -> ClientEnvelope {
        CaptureEncoder::new().encode_frame(&[0.0; 16])
    }

    #[test]
    fn test_send_and_close() {
        let (link, mut rx) = SessionLink::channel(4);
        assert!(link.is_open());

        link.send(&hello()).unwrap();
        link.close();
        assert!(!link.is_open());
        assert!(matches!(link.send(&hello()), Err(SessionError::NotConnected)));

        assert!(matches!(rx.try_recv(), Ok(Outbound::Text(t)) if t.contains("clientContent")));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_close_is_sent_once() {
        let (link, mut rx) = SessionLink::channel(4);
        link.close();
        link.close();
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_closes_link() {
        let (link, rx) = SessionLink::channel(4);
        drop(rx);
        assert!(!link.is_open());
        assert!(link.send(&hello()).is_err());
    }

    #[test]
    fn test_full_audio_backlog_drops_audio_only() {
        let (link, mut rx) = SessionLink::channel(1);
        link.send(&mic_frame()).unwrap();
        assert!(matches!(link.send(&mic_frame()), Err(SessionError::ChannelFull)));
        assert!(link.is_open());

        // Control envelopes still queue behind a full audio backlog
        for _ in 0..300 {
            link.send(&hello()).unwrap();
        }

        assert!(matches!(rx.try_recv(), Ok(Outbound::Text(t)) if t.contains("realtimeInput")));
        // Draining an audio frame frees its slot
        link.send(&mic_frame()).unwrap();

        let mut control = 0;
        let mut audio = 0;
        while let Ok(Outbound::Text(text)) = rx.try_recv() {
            if text.contains("realtimeInput") {
                audio += 1;
            } else {
                control += 1;
            }
        }
        assert_eq!(control, 300);
        assert_eq!(audio, 1);
    }
}
