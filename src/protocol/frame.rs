//! Frame parsing and serialization (RFC 6455 Section 5.2).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Decoded fixed part of a frame: everything before the payload.
///
/// The header is available as soon as its (at most 14) bytes have arrived,
/// which lets the reader reject a frame by its declared size before any of
/// the payload is buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, if the frame is masked.
    pub mask: Option<[u8; 4]>,
    /// Declared payload length.
    pub payload_len: usize,
    /// Length of the header on the wire, including the masking key.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a frame header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if not enough data is available
    /// - `Error::ReservedOpcode` for reserved opcodes
    /// - `Error::PayloadTooLargeForPlatform` if the length does not fit in `usize`
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];
        let opcode = OpCode::from_first_byte(byte0)?;
        let masked = (byte1 & 0x80) != 0;

        let (payload_len, len_end) = match byte1 & 0x7F {
            126 => {
                need(buf, 4)?;
                (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
            }
            127 => {
                need(buf, 10)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[2..10]);
                let len = u64::from_be_bytes(raw);
                let len = usize::try_from(len).map_err(|_| Error::PayloadTooLargeForPlatform {
                    size: len,
                    max: usize::MAX as u64,
                })?;
                (len, 10)
            }
            short => (short as usize, 2),
        };

        let mask = if masked {
            need(buf, len_end + 4)?;
            Some([buf[len_end], buf[len_end + 1], buf[len_end + 2], buf[len_end + 3]])
        } else {
            None
        };

        Ok(Self {
            fin: (byte0 & 0x80) != 0,
            rsv1: (byte0 & 0x40) != 0,
            rsv2: (byte0 & 0x20) != 0,
            rsv3: (byte0 & 0x10) != 0,
            opcode,
            mask,
            payload_len,
            header_len: if masked { len_end + 4 } else { len_end },
        })
    }

    /// Total wire size of the frame this header describes.
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLargeForPlatform` on overflow.
    pub fn frame_len(&self) -> Result<usize> {
        self.header_len
            .checked_add(self.payload_len)
            .ok_or(Error::PayloadTooLargeForPlatform {
                size: self.payload_len as u64,
                max: usize::MAX as u64,
            })
    }
}

#[inline]
fn need(buf: &[u8], len: usize) -> Result<()> {
    if buf.len() < len {
        Err(Error::IncompleteFrame {
            needed: len - buf.len(),
        })
    } else {
        Ok(())
    }
}

/// A single WebSocket frame with an unmasked payload.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                 Masking key (if MASK set)                     |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Reserved bit 1. Must be 0 unless an extension is negotiated.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload: payload.into(),
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let mut payload = BytesMut::new();
        if let Some(code) = code {
            payload.put_u16(code);
            // keep the whole control payload within 125 bytes
            let mut end = reason.len().min(MAX_CONTROL_FRAME_PAYLOAD - 2);
            while !reason.is_char_boundary(end) {
                end -= 1;
            }
            payload.put_slice(&reason.as_bytes()[..end]);
        }
        Self::new(true, OpCode::Close, payload.freeze())
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Build a frame from a parsed header and its raw payload bytes,
    /// unmasking in place when needed.
    #[must_use]
    pub fn from_parts(header: &FrameHeader, mut payload: BytesMut) -> Self {
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut payload, mask);
        }
        Self {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode: header.opcode,
            payload: payload.freeze(),
        }
    }

    /// Parse a frame from a buffer.
    ///
    /// Returns the parsed frame and the number of bytes consumed.
    ///
    /// ## Errors
    ///
    /// - `Error::IncompleteFrame` if not enough data is available
    /// - `Error::ReservedOpcode` for reserved opcodes
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf)?;
        let total = header.frame_len()?;
        need(buf, total)?;
        let payload = BytesMut::from(&buf[header.header_len..total]);
        Ok((Self::from_parts(&header, payload), total))
    }

    /// Validate the frame according to RFC 6455.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if RSV bits are set without extension
    /// - `Error::FragmentedControlFrame` if control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if control frame payload > 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }

        Ok(())
    }

    /// Append the wire form of this frame to `dst`.
    ///
    /// `mask` must be `Some` for frames sent by a client.
    pub fn encode(&self, dst: &mut BytesMut, mask: Option<[u8; 4]>) {
        let payload_len = self.payload.len();
        dst.reserve(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }
        dst.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0 };
        if payload_len <= 125 {
            dst.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= u16::MAX as usize {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(payload_len as u16);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(payload_len as u64);
        }

        match mask {
            Some(key) => {
                dst.put_slice(&key);
                let start = dst.len();
                dst.put_slice(&self.payload);
                apply_mask_fast(&mut dst[start..], key);
            }
            None => dst.put_slice(&self.payload),
        }
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len <= 125 {
            0
        } else if payload_len <= u16::MAX as usize {
            2
        } else {
            8
        };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}
