use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

use crate::codec::{FrameReader, FrameWriter};
use crate::config::{Config, ResponseHeader};
use crate::connection::close::{CloseCause, CloseCoordinator};
use crate::connection::heartbeat::Heartbeat;
use crate::connection::reader::InboundReader;
use crate::connection::writer::{CloseRequest, OutboundDispatcher};
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::message::{Message, MessageMode};
use crate::protocol::MessageAssembler;

const CONTROL_QUEUE_CAPACITY: usize = 8;

/// Outcome of [`Connection::read_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRead {
    /// Number of bytes copied into the caller's buffer.
    pub len: usize,
    /// Tag of the message the bytes came from.
    pub mode: MessageMode,
}

impl MessageRead {
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        self.mode.is_binary()
    }
}

/// Outcome of [`Connection::write`]: the message was accepted into the
/// outbound queue. It says nothing about delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    /// Full payload length of the accepted message.
    pub len: usize,
}

/// A message-oriented byte stream over an established WebSocket.
///
/// `Connection::new` splits the stream and spawns three background tasks:
/// an inbound reader that owns every socket read, an outbound dispatcher
/// that owns every socket write, and (when `ping_interval` is non-zero) a
/// heartbeat. All methods take `&self`, so the connection can be shared
/// behind an `Arc` by any number of readers and writers.
///
/// Any terminal condition (local close, peer close frame, decode error,
/// I/O failure, write deadline, missing pong) tears everything down once.
/// Messages already queued stay readable; after that every read and write
/// returns the recorded cause.
///
/// ## Example
///
/// ```rust,ignore
/// use wsstream::{Config, Connection, MessageMode, Role};
///
/// let stream = tokio::net::TcpStream::connect("example.com:80").await?;
/// // ... upgrade handshake ...
/// let conn = Connection::new(stream, Role::Client, Config::client());
///
/// conn.set_message_mode(MessageMode::Text)?;
/// conn.write(b"hello").await?;
///
/// let mut buf = [0u8; 1024];
/// let read = conn.read_message(&mut buf).await?;
/// println!("{} bytes, binary: {}", read.len, read.is_binary());
///
/// conn.close().await?;
/// conn.closed().await;
/// ```
pub struct Connection {
    role: Role,
    config: Config,
    mode: AtomicU8,
    inbound: Mutex<mpsc::Receiver<Message>>,
    outbound: mpsc::Sender<Message>,
    close_requests: mpsc::Sender<CloseRequest>,
    coordinator: Arc<CloseCoordinator>,
    tracker: TaskTracker,
}

impl Connection {
    /// Take over `stream`, which must already carry WebSocket frames (the
    /// upgrade handshake is done elsewhere).
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new<T>(stream: T, role: Role, config: Config) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let coordinator = Arc::new(CloseCoordinator::new());

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
        let (close_tx, close_rx) = mpsc::channel(1);
        let (pong_tx, pong_rx) = watch::channel(0u64);

        let tracker = TaskTracker::new();

        let reader = InboundReader::new(
            FrameReader::new(read_half, role, &config),
            MessageAssembler::new(config.limits.clone()),
            inbound_tx,
            control_tx.clone(),
            pong_tx,
            Arc::clone(&coordinator),
        );
        tracker.spawn(reader.run());

        let dispatcher = OutboundDispatcher::new(
            FrameWriter::new(write_half, role),
            outbound_rx,
            control_rx,
            close_rx,
            Arc::clone(&coordinator),
            config.write_timeout,
        );
        tracker.spawn(dispatcher.run());

        if config.heartbeat_enabled() {
            let heartbeat = Heartbeat::new(
                config.ping_interval,
                config.pong_timeout,
                control_tx,
                pong_rx,
                Arc::clone(&coordinator),
            );
            tracker.spawn(heartbeat.run());
        }
        tracker.close();

        tokio::spawn({
            let tracker = tracker.clone();
            let coordinator = Arc::clone(&coordinator);
            async move {
                tracker.wait().await;
                coordinator.mark_closed();
                debug!("Connection closed");
            }
        });

        debug!(
            %role,
            ping_interval = ?config.ping_interval,
            pong_timeout = ?config.pong_timeout,
            "Connection opened"
        );

        Self {
            role,
            mode: AtomicU8::new(MessageMode::default().into()),
            inbound: Mutex::new(inbound_rx),
            outbound: outbound_tx,
            close_requests: close_tx,
            coordinator,
            tracker,
            config,
        }
    }

    /// Wait for the next message and copy as much of its payload as fits
    /// into `buf`. The rest of a longer message is discarded.
    ///
    /// Shares the inbound queue with [`read_message`](Self::read_message)
    /// and [`recv`](Self::recv); mixing them interleaves messages between
    /// callers.
    ///
    /// # Errors
    ///
    /// Once the queue is drained after teardown, the terminal cause.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.read_message(buf).await.map(|read| read.len)
    }

    /// Like [`read`](Self::read), also reporting the message's tag.
    pub async fn read_message(&self, buf: &mut [u8]) -> Result<MessageRead> {
        let message = self.recv().await?;
        let len = message.copy_to(buf);
        if len < message.len() {
            trace!(
                len = message.len(),
                kept = len,
                "Message truncated to fit read buffer"
            );
        }
        Ok(MessageRead {
            len,
            mode: message.mode(),
        })
    }

    /// Wait for the next whole message.
    pub async fn recv(&self) -> Result<Message> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(message) => Ok(message),
            None => Err(self.coordinator.terminal_error()),
        }
    }

    /// Queue `data` as one message tagged with the current message mode.
    ///
    /// Returns as soon as the outbound queue has accepted it, waiting only
    /// while the queue is full. Safe to call from many tasks at once; the
    /// wire order is the order in which the queue accepted the messages.
    ///
    /// # Errors
    ///
    /// The terminal cause once teardown has started.
    pub async fn write(&self, data: &[u8]) -> Result<Enqueued> {
        let message = Message::new(Bytes::copy_from_slice(data), self.message_mode());
        self.write_message(message).await
    }

    /// Queue a message with its own tag, ignoring the current message mode.
    pub async fn write_message(&self, message: Message) -> Result<Enqueued> {
        if self.coordinator.is_closing() {
            return Err(self.coordinator.terminal_error());
        }
        let len = message.len();
        self.outbound
            .send(message)
            .await
            .map_err(|_| self.coordinator.terminal_error())?;
        Ok(Enqueued { len })
    }

    /// Set the tag used by later [`write`](Self::write) calls. A new
    /// connection writes text.
    ///
    /// Accepts a [`MessageMode`] or its raw value (1 text, 2 binary).
    ///
    /// # Errors
    ///
    /// `Error::InvalidMessageMode` for any other value; the current mode is
    /// left unchanged.
    pub fn set_message_mode(&self, mode: impl Into<u8>) -> Result<()> {
        let raw = mode.into();
        match MessageMode::try_from(raw) {
            Ok(mode) => {
                self.mode.store(raw, Ordering::Release);
                debug!(%mode, "Message mode changed");
                Ok(())
            }
            Err(err) => {
                warn!(mode = raw, current = %self.message_mode(), "Ignoring invalid message mode");
                Err(err)
            }
        }
    }

    /// The tag applied to messages queued by [`write`](Self::write).
    pub fn message_mode(&self) -> MessageMode {
        MessageMode::try_from(self.mode.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Ask the dispatcher to close the connection.
    ///
    /// Returns once the request has been taken, which starts teardown; use
    /// [`closed`](Self::closed) to wait for it to finish.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if teardown had already started
    /// - `Error::CloseTimeout` if the request was not taken within
    ///   `close_timeout`; teardown proceeds regardless
    pub async fn close(&self) -> Result<()> {
        if self.coordinator.is_closing() {
            return Err(self.already_closed());
        }

        let bound = self.config.close_timeout;
        let (ack_tx, ack_rx) = oneshot::channel();
        let handoff = async {
            self.close_requests.send(ack_tx).await.ok()?;
            ack_rx.await.ok()
        };
        match timeout(bound, handoff).await {
            Ok(Some(())) => Ok(()),
            Ok(None) => Err(self.already_closed()),
            Err(_) => {
                warn!(?bound, "Close request not taken in time");
                Err(Error::CloseTimeout(bound))
            }
        }
    }

    /// Wait until every background task has exited and the stream has been
    /// released.
    pub async fn closed(&self) {
        self.tracker.wait().await;
        self.coordinator.mark_closed();
    }

    fn already_closed(&self) -> Error {
        match self.coordinator.cause() {
            Some(CloseCause::Peer(code)) => Error::ConnectionClosed(code),
            _ => Error::ConnectionClosed(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.coordinator.state()
    }

    /// Returns `true` once teardown has started.
    pub fn is_closed(&self) -> bool {
        self.coordinator.is_closing()
    }

    /// Why the connection was torn down, if it has been.
    pub fn close_cause(&self) -> Option<CloseCause> {
        self.coordinator.cause()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Headers for the upgrade response, passed through from the config.
    pub fn response_header(&self) -> &ResponseHeader {
        &self.config.response_header
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("state", &self.state())
            .field("mode", &self.message_mode())
            .finish_non_exhaustive()
    }
}
