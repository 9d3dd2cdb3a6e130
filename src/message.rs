//! Application messages and close codes.

use bytes::Bytes;

use crate::error::Error;
use crate::protocol::OpCode;

/// Tag carried by every data message.
///
/// The raw values match the RFC 6455 data opcodes, so a mode can also be
/// given as `1` (text) or `2` (binary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MessageMode {
    /// UTF-8 text message.
    #[default]
    Text = 0x1,
    /// Arbitrary binary message.
    Binary = 0x2,
}

impl MessageMode {
    /// The data opcode used to transmit a message in this mode.
    #[inline]
    #[must_use]
    pub const fn opcode(self) -> OpCode {
        match self {
            MessageMode::Text => OpCode::Text,
            MessageMode::Binary => OpCode::Binary,
        }
    }

    /// Returns `true` for [`MessageMode::Binary`].
    #[inline]
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(self, MessageMode::Binary)
    }
}

impl From<MessageMode> for u8 {
    fn from(mode: MessageMode) -> Self {
        mode as u8
    }
}

impl TryFrom<u8> for MessageMode {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0x1 => Ok(MessageMode::Text),
            0x2 => Ok(MessageMode::Binary),
            other => Err(Error::InvalidMessageMode(other)),
        }
    }
}

impl std::fmt::Display for MessageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageMode::Text => write!(f, "Text"),
            MessageMode::Binary => write!(f, "Binary"),
        }
    }
}

/// An immutable application message: payload bytes plus a binary/text tag.
///
/// Cloning is cheap; the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
    mode: MessageMode,
}

impl Message {
    /// Create a message with an explicit mode.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>, mode: MessageMode) -> Self {
        Self {
            payload: payload.into(),
            mode,
        }
    }

    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        let s: String = s.into();
        Self::new(s, MessageMode::Text)
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(data, MessageMode::Binary)
    }

    /// The message tag.
    #[inline]
    #[must_use]
    pub const fn mode(&self) -> MessageMode {
        self.mode
    }

    /// Returns `true` if this is a binary message.
    #[inline]
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        self.mode.is_binary()
    }

    /// Returns `true` if this is a text message.
    #[inline]
    #[must_use]
    pub const fn is_text(&self) -> bool {
        !self.mode.is_binary()
    }

    /// Borrow the payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Borrow the payload as text, if it is valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Consume and return the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Copy as much of the payload as fits into `buf`, returning the count.
    pub(crate) fn copy_to(&self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.payload.len());
        buf[..n].copy_from_slice(&self.payload[..n]);
        n
    }
}

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001).
    GoingAway,
    /// Protocol error (1002).
    ProtocolError,
    /// Unsupported data (1003).
    UnsupportedData,
    /// No status received (1005). Never sent on the wire.
    NoStatus,
    /// Abnormal closure (1006). Never sent on the wire.
    Abnormal,
    /// Invalid payload (1007), e.g. non-UTF-8 text.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Internal error (1011).
    InternalError,
    /// Any other code.
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code is reserved and MUST NOT be sent in a Close frame.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self.as_u16(), 1004..=1006 | 1015)
    }

    /// The code to send when the connection is torn down because of `err`.
    #[must_use]
    pub const fn for_error(err: &Error) -> Self {
        match err {
            Error::MessageTooLarge { .. }
            | Error::FrameTooLarge { .. }
            | Error::PayloadTooLargeForPlatform { .. }
            | Error::TooManyFragments { .. } => CloseCode::MessageTooBig,
            Error::InvalidUtf8 => CloseCode::InvalidPayload,
            Error::PongTimeout(_) => CloseCode::GoingAway,
            Error::Io(_) | Error::WriteTimeout(_) => CloseCode::Abnormal,
            _ if err.is_decode() => CloseCode::ProtocolError,
            _ => CloseCode::InternalError,
        }
    }
}

/// Parsed payload of a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason for closing (UTF-8, max 123 bytes).
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Parse the payload of a received close frame.
    ///
    /// Returns `None` for an empty payload.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a one-byte payload
    /// - `Error::InvalidUtf8` if the reason is not UTF-8
    pub fn parse(payload: &[u8]) -> crate::Result<Option<Self>> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(Error::ProtocolViolation("Invalid close frame".into())),
            _ => {
                let code = u16::from_be_bytes([payload[0], payload[1]]);
                let reason = std::str::from_utf8(&payload[2..])?;
                Ok(Some(Self::new(CloseCode::from_u16(code), reason)))
            }
        }
    }
}
