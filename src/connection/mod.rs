//! The connection engine: one task reads the stream, one task writes it,
//! an optional heartbeat checks the peer is alive, and a close coordinator
//! tears all of it down exactly once.
//!
//! ## Connection Lifecycle
//!
//! 1. **Open** - tasks running, reads and writes accepted
//! 2. **Closing** - a terminal cause was recorded; queued messages can
//!    still be read
//! 3. **Closed** - every task has exited and the stream is released
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsstream::{Config, Connection, Role};
//!
//! let conn = Connection::new(stream, Role::Server, Config::server());
//! let mut buf = vec![0u8; 4096];
//! let n = conn.read(&mut buf).await?;
//! conn.write(&buf[..n]).await?;
//! conn.close().await?;
//! ```

mod close;
#[allow(clippy::module_inception)]
mod connection;
mod heartbeat;
mod reader;
mod role;
mod state;
mod writer;

pub use close::CloseCause;
pub use connection::{Connection, Enqueued, MessageRead};
pub use role::Role;
pub use state::ConnectionState;
