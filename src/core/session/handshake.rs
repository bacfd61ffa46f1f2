//! Session handshake state machine.
//!
//! `Idle → AwaitingSetup → Ready → Closed`. While awaiting `setupComplete`,
//! client-originated actions are parked in a FIFO and released in enqueue
//! order on the transition to `Ready`. `Closed` is terminal; a new session is
//! needed to start over.

use std::collections::VecDeque;
use std::fmt;

use super::error::{SessionError, SessionResult};

/// Handshake state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    /// Socket not opened yet
    #[default]
    Idle,
    /// Setup sent, waiting for `setupComplete`
    AwaitingSetup,
    /// Capability negotiation finished; client content may flow
    Ready,
    /// Terminal
    Closed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Idle => write!(f, "Idle"),
            HandshakeState::AwaitingSetup => write!(f, "AwaitingSetup"),
            HandshakeState::Ready => write!(f, "Ready"),
            HandshakeState::Closed => write!(f, "Closed"),
        }
    }
}

/// Outcome of [`Handshake::enqueue`].
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<A> {
    /// Already ready: run the action now.
    Run(A),
    /// Parked until `setupComplete`.
    Queued,
    /// Session closed (or never opened); the action was discarded.
    Rejected(A),
}

/// Readiness tracker plus the pre-ready action queue.
#[derive(Debug)]
pub struct Handshake<A> {
    state: HandshakeState,
    pending: VecDeque<A>,
}

impl<A> Default for Handshake<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Handshake<A> {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Idle,
            pending: VecDeque::new(),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == HandshakeState::Ready
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// `Idle → AwaitingSetup`. The caller sends the setup envelope.
    pub fn begin(&mut self) -> SessionResult<()> {
        match self.state {
            HandshakeState::Idle => {
                self.state = HandshakeState::AwaitingSetup;
                Ok(())
            }
            other => Err(SessionError::InvalidTransition {
                from: other,
                to: HandshakeState::AwaitingSetup,
            }),
        }
    }

    /// Admit a client-originated action according to the current state.
    pub fn enqueue(&mut self, action: A) -> Admission<A> {
        match self.state {
            HandshakeState::Ready => Admission::Run(action),
            HandshakeState::AwaitingSetup => {
                self.pending.push_back(action);
                Admission::Queued
            }
            HandshakeState::Idle | HandshakeState::Closed => Admission::Rejected(action),
        }
    }

    /// `AwaitingSetup → Ready`, returning the parked actions in enqueue order.
    ///
    /// A duplicate `setupComplete` while already ready is harmless and yields
    /// nothing.
    pub fn complete(&mut self) -> SessionResult<Vec<A>> {
        match self.state {
            HandshakeState::AwaitingSetup => {
                self.state = HandshakeState::Ready;
                Ok(self.pending.drain(..).collect())
            }
            HandshakeState::Ready => Ok(Vec::new()),
            other => Err(SessionError::InvalidTransition {
                from: other,
                to: HandshakeState::Ready,
            }),
        }
    }

    /// Enter `Closed`, returning how many parked actions were discarded.
    pub fn close(&mut self) -> usize {
        self.state = HandshakeState::Closed;
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let handshake: Handshake<u8> = Handshake::new();
        assert_eq!(handshake.state(), HandshakeState::Idle);
        assert!(!handshake.is_ready());
    }

    #[test]
    fn test_enqueue_before_open_is_rejected() {
        let mut handshake = Handshake::new();
        assert_eq!(handshake.enqueue(1), Admission::Rejected(1));
    }

    #[test]
    fn test_queue_drains_in_order() {
        let mut handshake = Handshake::new();
        handshake.begin().unwrap();

        assert_eq!(handshake.enqueue("greet"), Admission::Queued);
        assert_eq!(handshake.enqueue("capture"), Admission::Queued);
        assert_eq!(handshake.enqueue("third"), Admission::Queued);
        assert_eq!(handshake.pending_len(), 3);

        let drained = handshake.complete().unwrap();
        assert_eq!(drained, vec!["greet", "capture", "third"]);
        assert_eq!(handshake.state(), HandshakeState::Ready);
        assert_eq!(handshake.pending_len(), 0);
    }

    #[test]
    fn test_ready_runs_immediately() {
        let mut handshake = Handshake::new();
        handshake.begin().unwrap();
        handshake.complete().unwrap();
        assert_eq!(handshake.enqueue(7), Admission::Run(7));
    }

    #[test]
    fn test_duplicate_setup_complete() {
        let mut handshake: Handshake<u8> = Handshake::new();
        handshake.begin().unwrap();
        handshake.complete().unwrap();
        assert!(handshake.complete().unwrap().is_empty());
    }

    #[test]
    fn test_setup_complete_before_open_is_invalid() {
        let mut handshake: Handshake<u8> = Handshake::new();
        assert!(matches!(
            handshake.complete(),
            Err(SessionError::InvalidTransition {
                from: HandshakeState::Idle,
                to: HandshakeState::Ready
            })
        ));
    }

    #[test]
    fn test_close_discards_pending() {
        let mut handshake = Handshake::new();
        handshake.begin().unwrap();
        handshake.enqueue(1);
        handshake.enqueue(2);

        assert_eq!(handshake.close(), 2);
        assert_eq!(handshake.state(), HandshakeState::Closed);
        assert_eq!(handshake.enqueue(3), Admission::Rejected(3));
        assert!(handshake.complete().is_err());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut handshake: Handshake<u8> = Handshake::new();
        handshake.close();
        assert!(handshake.begin().is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(HandshakeState::AwaitingSetup.to_string(), "AwaitingSetup");
        assert_eq!(HandshakeState::Closed.to_string(), "Closed");
    }
}
