//! Outbound dispatcher task: the only code that writes to the stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::codec::FrameWriter;
use crate::connection::close::{CloseCause, CloseCoordinator, TeardownGuard};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::Frame;

/// A close request from the application, acknowledged once the dispatcher
/// has taken it.
pub(crate) type CloseRequest = oneshot::Sender<()>;

/// Drains the control and outbound queues onto the stream, one frame per
/// entry, until the connection closes.
pub(crate) struct OutboundDispatcher<W> {
    frames: FrameWriter<W>,
    outbound: mpsc::Receiver<Message>,
    control: mpsc::Receiver<Frame>,
    close_requests: mpsc::Receiver<CloseRequest>,
    coordinator: Arc<CloseCoordinator>,
    write_timeout: Duration,
}

impl<W: AsyncWrite + Unpin> OutboundDispatcher<W> {
    pub(crate) fn new(
        frames: FrameWriter<W>,
        outbound: mpsc::Receiver<Message>,
        control: mpsc::Receiver<Frame>,
        close_requests: mpsc::Receiver<CloseRequest>,
        coordinator: Arc<CloseCoordinator>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            frames,
            outbound,
            control,
            close_requests,
            coordinator,
            write_timeout,
        }
    }

    pub(crate) async fn run(mut self) {
        let _guard = TeardownGuard::new(
            Arc::clone(&self.coordinator),
            "outbound dispatcher",
            CloseCause::Write,
        );
        let token = self.coordinator.token().clone();
        loop {
            let frame = tokio::select! {
                biased;
                () = token.cancelled() => break,
                Some(ack) = self.close_requests.recv() => {
                    self.coordinator.trigger(CloseCause::Local);
                    let _ = ack.send(());
                    break;
                }
                Some(frame) = self.control.recv() => frame,
                message = self.outbound.recv() => match message {
                    Some(message) => data_frame(message),
                    None => {
                        // every handle to the connection has been dropped
                        self.coordinator.trigger(CloseCause::Local);
                        break;
                    }
                },
            };

            // a started frame is always finished, so cancellation is only
            // observed between frames
            if let Err(err) = self.write(&frame).await {
                self.coordinator.trigger(CloseCause::Write(err));
                break;
            }
            trace!(opcode = %frame.opcode, len = frame.payload().len(), "Frame written");
        }
        self.shutdown().await;
    }

    async fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.write_timeout.is_zero() {
            return self.frames.write_frame(frame).await;
        }
        match timeout(self.write_timeout, self.frames.write_frame(frame)).await {
            Ok(result) => result,
            Err(_) => Err(Error::WriteTimeout(self.write_timeout)),
        }
    }

    async fn shutdown(mut self) {
        // senders blocked on a full queue fail from here on
        self.outbound.close();
        self.close_requests.close();

        let cause = self.coordinator.cause();
        if let Some(frame) = cause.as_ref().and_then(CloseCause::close_frame) {
            match self.write(&frame).await {
                Ok(()) => debug!("Close frame sent"),
                Err(err) => debug!(error = %err, "Close frame not sent"),
            }
        }

        let shutdown = self.frames.shutdown();
        match timeout(self.write_timeout.max(Duration::from_millis(1)), shutdown).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(error = %err, "Stream shutdown failed"),
            Err(_) => debug!("Stream shutdown timed out"),
        }
        debug!("Outbound dispatcher stopped");
    }
}

fn data_frame(message: Message) -> Frame {
    let opcode = message.mode().opcode();
    Frame::new(true, opcode, message.into_payload())
}
