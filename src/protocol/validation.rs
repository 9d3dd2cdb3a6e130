//! Header-level validation of incoming frames.
//!
//! Runs as soon as a frame header has been decoded, before its payload is
//! buffered, so a peer cannot make the reader allocate for a frame that will
//! be rejected anyway.

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Frame validator for incoming frames.
///
/// Enforces RFC 6455 masking and RSV rules based on connection role, the
/// control-frame constraints, and the configured size limits.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    role: Role,
    limits: Limits,
    accept_unmasked_frames: bool,
}

impl FrameValidator {
    /// Create a new frame validator.
    pub fn new(role: Role, limits: Limits) -> Self {
        Self {
            role,
            limits,
            accept_unmasked_frames: false,
        }
    }

    /// Accept unmasked frames on the server side (non-RFC compliant).
    pub fn with_accept_unmasked(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Validate a decoded frame header.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedClientFrame` / `Error::MaskedServerFrame` for masking violations
    /// - `Error::ReservedBitsSet` if any RSV bit is set
    /// - `Error::FragmentedControlFrame` / `Error::ControlFrameTooLarge` for bad control frames
    /// - `Error::MessageTooLarge` if a data frame alone exceeds the message limit
    /// - `Error::FrameTooLarge` if the frame exceeds the frame limit
    pub fn validate_header(&self, header: &FrameHeader) -> Result<()> {
        self.validate_masking(header.mask.is_some())?;

        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if header.opcode.is_control() {
            if !header.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(header.payload_len));
            }
            return Ok(());
        }

        // A single data frame larger than the message limit can never be
        // part of an acceptable message.
        self.limits.check_message_size(header.payload_len)?;
        self.limits.check_frame_size(header.payload_len)
    }

    fn validate_masking(&self, masked: bool) -> Result<()> {
        match self.role {
            Role::Server if !masked && !self.accept_unmasked_frames => {
                Err(Error::UnmaskedClientFrame)
            }
            Role::Client if masked => Err(Error::MaskedServerFrame),
            _ => Ok(()),
        }
    }
}
