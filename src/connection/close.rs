//! At-most-once teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::connection::state::{AtomicState, ConnectionState};
use crate::error::Error;
use crate::message::CloseCode;
use crate::protocol::Frame;

/// Why a connection was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CloseCause {
    /// The application called `close()` or dropped the connection.
    Local,
    /// The peer sent a close frame, with its status code if any.
    Peer(Option<u16>),
    /// Reading or decoding an incoming frame failed.
    Read(Error),
    /// Writing a frame failed or missed its deadline.
    Write(Error),
    /// No pong arrived within the pong timeout.
    PongTimeout(Duration),
}

impl CloseCause {
    /// The error reported to reads and writes after teardown.
    #[must_use]
    pub fn error(&self) -> Error {
        match self {
            CloseCause::Local => Error::ConnectionClosed(None),
            CloseCause::Peer(code) => Error::ConnectionClosed(*code),
            CloseCause::Read(err) | CloseCause::Write(err) => err.clone(),
            CloseCause::PongTimeout(after) => Error::PongTimeout(*after),
        }
    }

    /// The close frame to send on the way out, if any.
    ///
    /// Nothing is sent after a write failure, when the peer's stream has
    /// already ended, or when the derived code may not appear on the wire.
    pub(crate) fn close_frame(&self) -> Option<Frame> {
        let code = match self {
            CloseCause::Local => CloseCode::Normal,
            CloseCause::Peer(None) => return Some(Frame::close(None, "")),
            CloseCause::Peer(Some(code)) => CloseCode::from_u16(*code),
            CloseCause::Write(_) | CloseCause::Read(Error::ConnectionClosed(_)) => return None,
            CloseCause::Read(err) => CloseCode::for_error(err),
            CloseCause::PongTimeout(_) => CloseCode::GoingAway,
        };
        if code.is_reserved() {
            return None;
        }
        Some(Frame::close(Some(code.as_u16()), ""))
    }
}

impl std::fmt::Display for CloseCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseCause::Local => write!(f, "closed locally"),
            CloseCause::Peer(Some(code)) => write!(f, "closed by peer with code {code}"),
            CloseCause::Peer(None) => write!(f, "closed by peer"),
            CloseCause::Read(err) => write!(f, "read failed: {err}"),
            CloseCause::Write(err) => write!(f, "write failed: {err}"),
            CloseCause::PongTimeout(after) => write!(f, "no pong within {after:?}"),
        }
    }
}

/// Collapses every terminal condition into a single teardown.
///
/// The first [`trigger`](Self::trigger) wins: it records the cause, moves
/// the state to `Closing` and cancels the token every background task
/// watches. Later triggers are no-ops.
#[derive(Debug, Default)]
pub(crate) struct CloseCoordinator {
    closing: AtomicBool,
    cause: Mutex<Option<CloseCause>>,
    state: AtomicState,
    token: CancellationToken,
}

impl CloseCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `cause` and start teardown. Returns `false` if teardown had
    /// already started.
    pub(crate) fn trigger(&self, cause: CloseCause) -> bool {
        if self.closing.swap(true, Ordering::AcqRel) {
            tracing::trace!(%cause, "Close already in progress");
            return false;
        }
        match &cause {
            CloseCause::Local | CloseCause::Peer(_) => {
                tracing::debug!(%cause, "Connection closing");
            }
            _ => tracing::warn!(%cause, "Connection failed"),
        }
        *self.cause.lock() = Some(cause);
        self.state.advance(ConnectionState::Closing);
        self.token.cancel();
        true
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub(crate) fn cause(&self) -> Option<CloseCause> {
        self.cause.lock().clone()
    }

    /// The error a caller sees once the connection is going away.
    pub(crate) fn terminal_error(&self) -> Error {
        self.cause()
            .map_or(Error::ConnectionClosed(None), |cause| cause.error())
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.load()
    }

    pub(crate) fn mark_closed(&self) {
        self.state.advance(ConnectionState::Closed);
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Held by a background task for as long as it runs. If the task ends
/// without any cause recorded (it panicked or was dropped mid-run), teardown
/// starts with `cause` built from an I/O error naming the task.
pub(crate) struct TeardownGuard {
    coordinator: Arc<CloseCoordinator>,
    task: &'static str,
    cause: fn(Error) -> CloseCause,
}

impl TeardownGuard {
    pub(crate) fn new(
        coordinator: Arc<CloseCoordinator>,
        task: &'static str,
        cause: fn(Error) -> CloseCause,
    ) -> Self {
        Self {
            coordinator,
            task,
            cause,
        }
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if self.coordinator.is_closing() {
            return;
        }
        let err = Error::Io(format!("{} stopped unexpectedly", self.task));
        self.coordinator.trigger((self.cause)(err));
    }
}
