//! Connection lifecycle state.

use std::sync::atomic::{AtomicU8, Ordering};

/// Connection lifecycle state.
///
/// A connection starts `Open`, moves to `Closing` the moment a terminal
/// condition is recorded, and becomes `Closed` once every background task
/// has exited and the stream has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Connection is open and ready for data transfer.
    #[default]
    Open,
    /// Teardown has started; queued inbound messages may still be read.
    Closing,
    /// All background tasks have finished.
    Closed,
}

impl ConnectionState {
    /// Check if the connection is in an active state.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Check if sending data is allowed in this state.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    const fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Open => 0,
            ConnectionState::Closing => 1,
            ConnectionState::Closed => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Open,
            1 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Lock-free cell holding a [`ConnectionState`]. Transitions only move
/// forward.
#[derive(Debug, Default)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Advance to `next` unless the state is already at or past it.
    pub(crate) fn advance(&self, next: ConnectionState) {
        self.0.fetch_max(next.as_u8(), Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Open);
        assert_eq!(AtomicState::default().load(), ConnectionState::Open);
    }

    #[test]
    fn test_can_send_in_each_state() {
        assert!(ConnectionState::Open.can_send());
        assert!(!ConnectionState::Closing.can_send());
        assert!(!ConnectionState::Closed.can_send());
    }

    #[test]
    fn test_is_active() {
        assert!(ConnectionState::Open.is_active());
        assert!(ConnectionState::Closing.is_active());
        assert!(!ConnectionState::Closed.is_active());
    }

    #[test]
    fn test_state_only_moves_forward() {
        let state = AtomicState::default();
        state.advance(ConnectionState::Closed);
        state.advance(ConnectionState::Closing);
        assert_eq!(state.load(), ConnectionState::Closed);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        assert_eq!(ConnectionState::Closing.to_string(), "Closing");
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
    }
}
