//! Inbound reader task: the only code that reads from the stream.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use crate::codec::FrameReader;
use crate::connection::close::{CloseCause, CloseCoordinator, TeardownGuard};
use crate::error::{Error, Result};
use crate::message::{CloseFrame, Message};
use crate::protocol::{Frame, MessageAssembler, OpCode};

enum Flow {
    Continue,
    Stop,
}

/// Reads frames, answers pings, reports pongs and feeds complete messages
/// to the inbound queue until the connection closes.
pub(crate) struct InboundReader<R> {
    frames: FrameReader<R>,
    assembler: MessageAssembler,
    inbound: mpsc::Sender<Message>,
    control: mpsc::Sender<Frame>,
    pongs: watch::Sender<u64>,
    coordinator: Arc<CloseCoordinator>,
}

impl<R: AsyncRead + Unpin> InboundReader<R> {
    pub(crate) fn new(
        frames: FrameReader<R>,
        assembler: MessageAssembler,
        inbound: mpsc::Sender<Message>,
        control: mpsc::Sender<Frame>,
        pongs: watch::Sender<u64>,
        coordinator: Arc<CloseCoordinator>,
    ) -> Self {
        Self {
            frames,
            assembler,
            inbound,
            control,
            pongs,
            coordinator,
        }
    }

    pub(crate) async fn run(mut self) {
        let _guard = TeardownGuard::new(
            Arc::clone(&self.coordinator),
            "inbound reader",
            CloseCause::Read,
        );
        let token = self.coordinator.token().clone();
        loop {
            let frame = tokio::select! {
                biased;
                () = token.cancelled() => break,
                frame = self.frames.read_frame() => frame,
            };

            let flow = match frame {
                Ok(frame) => self.handle(frame).await,
                Err(err) => Err(err),
            };
            match flow {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(err) => {
                    self.coordinator.trigger(CloseCause::Read(err));
                    break;
                }
            }
        }
        // dropping `inbound` here wakes readers waiting on an empty queue
        debug!("Inbound reader stopped");
    }

    async fn handle(&mut self, frame: Frame) -> Result<Flow> {
        match frame.opcode {
            OpCode::Ping => {
                trace!(len = frame.payload().len(), "Ping received");
                let pong = Frame::pong(frame.into_payload());
                let sent = tokio::select! {
                    biased;
                    () = self.coordinator.token().cancelled() => return Ok(Flow::Stop),
                    sent = self.control.send(pong) => sent,
                };
                Ok(if sent.is_ok() { Flow::Continue } else { Flow::Stop })
            }
            OpCode::Pong => {
                trace!("Pong received");
                self.pongs.send_modify(|seen| *seen = seen.wrapping_add(1));
                Ok(Flow::Continue)
            }
            OpCode::Close => {
                let code = peer_close_code(frame.payload())?;
                self.coordinator.trigger(CloseCause::Peer(code));
                Ok(Flow::Stop)
            }
            _ => {
                let Some(message) = self.assembler.push(frame)? else {
                    return Ok(Flow::Continue);
                };
                trace!(len = message.len(), mode = %message.mode(), "Message received");
                let pushed = tokio::select! {
                    biased;
                    () = self.coordinator.token().cancelled() => return Ok(Flow::Stop),
                    pushed = self.inbound.send(message) => pushed,
                };
                if pushed.is_err() {
                    // the connection handle is gone
                    self.coordinator.trigger(CloseCause::Local);
                    return Ok(Flow::Stop);
                }
                Ok(Flow::Continue)
            }
        }
    }
}

/// Extract the status code from a peer's close frame, rejecting codes that
/// may never appear on the wire.
fn peer_close_code(payload: &[u8]) -> Result<Option<u16>> {
    let Some(close) = CloseFrame::parse(payload)? else {
        return Ok(None);
    };
    let code = close.code.as_u16();
    if !(1000..5000).contains(&code) || close.code.is_reserved() {
        return Err(Error::ProtocolViolation(format!("Invalid close code {code}")));
    }
    debug!(code, reason = %close.reason, "Close frame received");
    Ok(Some(code))
}
