//! Reassembly of data frames into messages.

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::{Message, MessageMode};
use crate::protocol::utf8::Utf8Validator;
use crate::protocol::Frame;

/// Turns a sequence of data frames into complete [`Message`]s.
///
/// An unfragmented frame becomes a message without copying its payload.
/// Fragmented messages are accumulated until the final continuation frame,
/// enforcing the message size and fragment count limits along the way.
/// Text messages are UTF-8 validated incrementally.
pub struct MessageAssembler {
    buffer: BytesMut,
    mode: Option<MessageMode>,
    fragment_count: usize,
    utf8: Utf8Validator,
    limits: Limits,
}

impl MessageAssembler {
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            mode: None,
            fragment_count: 0,
            utf8: Utf8Validator::new(),
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    ///
    /// Returns `Some(message)` when the frame completes a message. Control
    /// frames are ignored and return `None`.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for an unexpected or missing continuation
    /// - `Error::MessageTooLarge` / `Error::TooManyFragments` when limits are exceeded
    /// - `Error::InvalidUtf8` for malformed text
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        if frame.opcode.is_control() {
            return Ok(None);
        }

        let mode = match (frame.opcode.message_mode(), self.mode) {
            (Some(_), Some(_)) => {
                return Err(Error::ProtocolViolation(
                    "Expected continuation frame".into(),
                ));
            }
            (None, None) => {
                return Err(Error::ProtocolViolation(
                    "Unexpected continuation frame".into(),
                ));
            }
            (Some(mode), None) => {
                if frame.fin {
                    return self.single(frame, mode).map(Some);
                }
                self.mode = Some(mode);
                self.utf8.reset();
                mode
            }
            (None, Some(mode)) => mode,
        };

        self.fragment_count += 1;
        self.limits.check_fragment_count(self.fragment_count)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;
        if mode == MessageMode::Text {
            self.utf8.validate(frame.payload(), frame.fin)?;
        }
        self.buffer.extend_from_slice(frame.payload());

        if !frame.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().freeze();
        self.reset();
        Ok(Some(Message::new(payload, mode)))
    }

    fn single(&mut self, frame: Frame, mode: MessageMode) -> Result<Message> {
        self.limits.check_message_size(frame.payload().len())?;
        if mode == MessageMode::Text {
            crate::protocol::validate_utf8(frame.payload())?;
        }
        Ok(Message::new(frame.into_payload(), mode))
    }

    pub fn is_assembling(&self) -> bool {
        self.mode.is_some()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.mode = None;
        self.fragment_count = 0;
        self.utf8.reset();
    }
}
