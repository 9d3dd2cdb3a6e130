//! Frame opcodes and their mapping to message modes.

use std::fmt;

use crate::error::{Error, Result};
use crate::message::MessageMode;

/// The kind of a frame, from the low four bits of its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[non_exhaustive]
pub enum OpCode {
    /// Carries the next piece of a fragmented message.
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    /// Decode the opcode from a frame's first byte; the FIN and RSV bits
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedOpcode` for 0x3-0x7 and 0xB-0xF.
    pub fn from_first_byte(byte0: u8) -> Result<Self> {
        match byte0 & 0x0F {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            reserved => Err(Error::ReservedOpcode(reserved)),
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Close, ping and pong. These may not be fragmented and are handled
    /// by the connection itself.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        (self as u8) & 0x08 != 0
    }

    /// The mode a message starting with this opcode is tagged with, or
    /// `None` for continuation and control frames.
    #[inline]
    #[must_use]
    pub const fn message_mode(self) -> Option<MessageMode> {
        match self {
            OpCode::Text => Some(MessageMode::Text),
            OpCode::Binary => Some(MessageMode::Binary),
            _ => None,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
