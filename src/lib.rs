//! # wsstream - a message-oriented byte stream over WebSocket
//!
//! `wsstream` turns an established WebSocket (any tokio `AsyncRead +
//! AsyncWrite` stream that already carries RFC 6455 frames) into a
//! connection with plain `read`/`write` calls.
//!
//! ## Features
//!
//! - **Single reader, single writer**: one task owns socket reads and one
//!   owns socket writes; any number of callers share the connection
//! - **Bounded queues** in both directions, so a slow side applies
//!   backpressure instead of growing memory
//! - **Heartbeat** with a pong deadline to detect dead peers
//! - **Bounded-time close** that tears everything down exactly once
//! - **Strict RFC 6455 validation** with size limits checked from the frame
//!   header
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use wsstream::{Config, Connection, MessageMode, Role};
//!
//! let config = Config::server()
//!     .with_ping_interval(Duration::from_secs(20))
//!     .with_pong_timeout(Duration::from_secs(10));
//! let conn = Connection::new(stream, Role::Server, config);
//!
//! conn.set_message_mode(MessageMode::Text)?;
//! conn.write(b"welcome").await?;
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

pub use config::{Config, Limits, ResponseHeader};
pub use connection::{CloseCause, Connection, ConnectionState, Enqueued, MessageRead, Role};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame, Message, MessageMode};
pub use protocol::OpCode;
