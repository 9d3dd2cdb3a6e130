//! Error types for the connection engine.
//!
//! Decode, write and liveness errors are terminal for a connection: the
//! first one recorded becomes the close cause and is returned by every
//! later `read`/`write`. Close timeouts and invalid message modes are local
//! to the call that produced them.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for connection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text message.
    #[error("Invalid UTF-8 in text message")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Declared payload length does not fit in memory on this platform.
    #[error("Payload length {size} exceeds platform maximum {max}")]
    PayloadTooLargeForPlatform {
        /// Declared payload length.
        size: u64,
        /// Platform maximum.
        max: u64,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Connection has been closed. Carries the peer's close code when the
    /// peer initiated the close.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    /// I/O error occurred on the underlying stream.
    #[error("I/O error: {0}")]
    Io(String),

    /// A frame could not be written before the write deadline.
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// No pong arrived before the pong deadline.
    #[error("No pong received within {0:?}")]
    PongTimeout(Duration),

    /// The close request was not accepted within the close bound.
    #[error("Close timed out after {0:?}")]
    CloseTimeout(Duration),

    /// Message mode value is neither binary nor text.
    #[error("Invalid message mode: {0}")]
    InvalidMessageMode(u8),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },
}

impl Error {
    /// Returns `true` for errors produced while decoding incoming frames.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(
            self,
            Error::ProtocolViolation(_)
                | Error::InvalidUtf8
                | Error::FrameTooLarge { .. }
                | Error::MessageTooLarge { .. }
                | Error::PayloadTooLargeForPlatform { .. }
                | Error::TooManyFragments { .. }
                | Error::ReservedOpcode(_)
                | Error::FragmentedControlFrame
                | Error::ControlFrameTooLarge(_)
                | Error::UnmaskedClientFrame
                | Error::MaskedServerFrame
                | Error::ReservedBitsSet
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
