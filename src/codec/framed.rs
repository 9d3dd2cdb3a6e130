use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::validation::FrameValidator;
use crate::protocol::{Frame, FrameHeader};

const READ_CHUNK: usize = 4096;

/// Largest step the read buffer grows by while a payload is arriving, so
/// memory follows the bytes received rather than the declared length.
const MAX_RESERVE: usize = READ_CHUNK * 16;

/// Generate a random seed for mask generation.
/// Falls back to system time if getrandom fails.
fn random_mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x12345678)
    }
}

/// Read half of the codec: turns a byte stream into validated frames.
pub struct FrameReader<R> {
    io: R,
    buf: BytesMut,
    validator: FrameValidator,
}

impl<R> FrameReader<R> {
    #[must_use]
    pub fn new(io: R, role: Role, config: &Config) -> Self {
        let validator = FrameValidator::new(role, config.limits.clone())
            .with_accept_unmasked(config.accept_unmasked_frames);
        Self {
            io,
            buf: BytesMut::with_capacity(READ_CHUNK * 2),
            validator,
        }
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read the next frame.
    ///
    /// The header is validated as soon as it is complete, so oversized or
    /// malformed frames are rejected before their payload is buffered.
    ///
    /// # Errors
    ///
    /// - decode errors from header parsing or validation
    /// - `Error::ConnectionClosed(None)` on end of stream
    /// - `Error::Io` from the underlying stream
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let mut validated = false;
        loop {
            match FrameHeader::parse(&self.buf) {
                Ok(header) => {
                    if !validated {
                        self.validator.validate_header(&header)?;
                        validated = true;
                    }
                    let total = header.frame_len()?;
                    if self.buf.len() >= total {
                        self.buf.advance(header.header_len);
                        let payload = self.buf.split_to(header.payload_len);
                        return Ok(Frame::from_parts(&header, payload));
                    }
                    self.buf.reserve((total - self.buf.len()).min(MAX_RESERVE));
                }
                Err(Error::IncompleteFrame { .. }) => self.buf.reserve(READ_CHUNK),
                Err(e) => return Err(e),
            }

            if self.io.read_buf(&mut self.buf).await? == 0 {
                return Err(Error::ConnectionClosed(None));
            }
        }
    }
}

/// Write half of the codec: serializes frames onto a byte stream, masking
/// them when the local role requires it.
pub struct FrameWriter<W> {
    io: W,
    buf: BytesMut,
    role: Role,
    mask_counter: u32,
}

impl<W> FrameWriter<W> {
    #[must_use]
    pub fn new(io: W, role: Role) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(READ_CHUNK),
            role,
            mask_counter: random_mask_seed(),
        }
    }

    fn generate_mask(&mut self) -> [u8; 4] {
        self.mask_counter = self.mask_counter.wrapping_add(0x9E37_79B9);
        let a = self.mask_counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d.to_le_bytes()
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Write one frame and flush it.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.role.must_mask().then(|| self.generate_mask());
        self.buf.clear();
        frame.encode(&mut self.buf, mask);
        self.io.write_all(&self.buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}
