//! Configuration and limits for connections.

use std::time::Duration;

/// Default bound on how long [`Connection::close`](crate::Connection::close)
/// waits for its request to be accepted.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Size limits applied to incoming frames and messages.
///
/// These limits prevent resource exhaustion and ensure bounded memory usage.
/// A value of `0` disables the corresponding check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single frame payload in bytes.
    ///
    /// Data frames are always bounded by `max_message_size` as well, so this
    /// only matters when it is set below that limit.
    ///
    /// Default: 0 (only the message limit applies)
    pub max_frame_size: usize,

    /// Maximum size of a complete message in bytes, after reassembling all
    /// fragments.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 0 (unlimited)
    pub max_fragment_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 0,
            max_message_size: 64 * 1024 * 1024, // 64 MB
            max_fragment_count: 0,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_frame_size: usize, max_message_size: usize, max_fragment_count: usize) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
        }
    }

    /// Limits with every check disabled.
    ///
    /// Warning: Use only with trusted peers.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::new(0, 0, 0)
    }

    /// Validate that message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if self.max_message_size != 0 && size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that frame size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: usize) -> Result<(), crate::Error> {
        if self.max_frame_size != 0 && size > self.max_frame_size {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`](crate::Error::TooManyFragments) if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if self.max_fragment_count != 0 && count > self.max_fragment_count {
            Err(crate::Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }
}

/// Opaque key/value bag for the upgrade handshake response.
///
/// The connection never interprets these entries; it only carries them so
/// the code performing the HTTP upgrade can include them in its response.
/// Insertion order is preserved and repeated keys are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeader {
    entries: Vec<(String, String)>,
}

impl ResponseHeader {
    /// Create an empty header bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Builder form of [`append`](Self::append).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// First value stored under `name` (ASCII case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Connection configuration.
///
/// Fixed at construction; the connection keeps its own copy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits for incoming data.
    pub limits: Limits,

    /// How often a ping is sent to check that the peer is alive.
    ///
    /// `Duration::ZERO` disables the heartbeat entirely.
    /// Default: disabled
    pub ping_interval: Duration,

    /// How long to wait for a pong after each ping before the connection is
    /// declared dead.
    ///
    /// `Duration::ZERO` sends pings without enforcing a deadline.
    /// Default: 10 seconds
    pub pong_timeout: Duration,

    /// Deadline for writing a single frame to the stream.
    ///
    /// `Duration::ZERO` writes without a deadline.
    /// Default: 10 seconds
    pub write_timeout: Duration,

    /// Bound on how long `close()` waits for its request to be accepted.
    ///
    /// Default: 30 seconds
    pub close_timeout: Duration,

    /// Capacity of the inbound message queue.
    ///
    /// Default: 32
    pub inbound_capacity: usize,

    /// Capacity of the outbound message queue.
    ///
    /// Default: 32
    pub outbound_capacity: usize,

    /// Accept unmasked frames from clients (server only).
    ///
    /// RFC 6455 requires clients to mask all frames. Setting this to `true`
    /// violates the RFC but may be useful for testing.
    ///
    /// Default: false
    pub accept_unmasked_frames: bool,

    /// Headers for the upgrade handshake response, forwarded untouched.
    pub response_header: ResponseHeader,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            ping_interval: Duration::ZERO,
            pong_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            inbound_capacity: 32,
            outbound_capacity: 32,
            accept_unmasked_frames: false,
            response_header: ResponseHeader::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the server side of a connection.
    #[must_use]
    pub fn server() -> Self {
        Self::default()
    }

    /// Configuration for the client side of a connection.
    ///
    /// Identical to the server defaults; masking is decided by the
    /// [`Role`](crate::Role) passed to the connection.
    #[must_use]
    pub fn client() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the maximum incoming message size; `0` means unbounded.
    ///
    /// This is the only size bound on incoming data: any separate frame cap
    /// is cleared.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.limits.max_message_size = size;
        self.limits.max_frame_size = 0;
        self
    }

    /// Set the ping interval; `Duration::ZERO` disables the heartbeat.
    #[must_use]
    pub const fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the pong timeout.
    #[must_use]
    pub const fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Set the per-frame write deadline.
    #[must_use]
    pub const fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the close handoff bound.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set the inbound queue capacity (minimum 1).
    #[must_use]
    pub const fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }

    /// Set the outbound queue capacity (minimum 1).
    #[must_use]
    pub const fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Accept unmasked frames from clients.
    #[must_use]
    pub const fn with_accept_unmasked_frames(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Set the handshake response headers.
    #[must_use]
    pub fn with_response_header(mut self, header: ResponseHeader) -> Self {
        self.response_header = header;
        self
    }

    /// Returns `true` if the heartbeat should run.
    #[inline]
    #[must_use]
    pub fn heartbeat_enabled(&self) -> bool {
        !self.ping_interval.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_default() {
        let limits = Limits::default();
        assert_eq!(limits.max_frame_size, 0);
        assert_eq!(limits.max_message_size, 64 * 1024 * 1024);
        assert_eq!(limits.max_fragment_count, 0);
    }

    #[test]
    fn test_message_size_is_the_only_size_bound() {
        let config = Config::server()
            .with_limits(Limits::new(1024, 1024, 0))
            .with_max_message_size(0);
        assert_eq!(config.limits.max_frame_size, 0);
        assert!(config.limits.check_frame_size(32 * 1024 * 1024).is_ok());
        assert!(config.limits.check_message_size(32 * 1024 * 1024).is_ok());

        let config = Config::server().with_max_message_size(32 * 1024 * 1024);
        assert!(config.limits.check_frame_size(17 * 1024 * 1024).is_ok());
    }

    #[test]
    fn test_limits_check_message_size() {
        let limits = Limits::new(0, 1024, 0);
        assert!(limits.check_message_size(1024).is_ok());
        assert!(matches!(
            limits.check_message_size(2048),
            Err(crate::Error::MessageTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[test]
    fn test_limits_zero_is_unbounded() {
        let limits = Limits::unbounded();
        assert!(limits.check_message_size(usize::MAX).is_ok());
        assert!(limits.check_frame_size(usize::MAX).is_ok());
        assert!(limits.check_fragment_count(usize::MAX).is_ok());
    }

    #[test]
    fn test_limits_check_fragment_count() {
        let limits = Limits::new(0, 0, 128);
        assert!(limits.check_fragment_count(50).is_ok());
        assert!(limits.check_fragment_count(200).is_err());
        assert!(Limits::default().check_fragment_count(200).is_ok());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(!config.heartbeat_enabled());
        assert_eq!(config.close_timeout, Duration::from_secs(30));
        assert_eq!(config.write_timeout, Duration::from_secs(10));
        assert!(!config.accept_unmasked_frames);
        assert!(config.response_header.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .with_ping_interval(Duration::from_secs(5))
            .with_pong_timeout(Duration::from_secs(2))
            .with_max_message_size(1024)
            .with_outbound_capacity(4);

        assert!(config.heartbeat_enabled());
        assert_eq!(config.pong_timeout, Duration::from_secs(2));
        assert_eq!(config.limits.max_message_size, 1024);
        assert_eq!(config.outbound_capacity, 4);
    }

    #[test]
    fn test_response_header_is_opaque_bag() {
        let header = ResponseHeader::new()
            .with("Sec-WebSocket-Protocol", "chat")
            .with("X-Trace", "a")
            .with("x-trace", "b");

        assert_eq!(header.len(), 3);
        assert_eq!(header.get("sec-websocket-protocol"), Some("chat"));
        assert_eq!(header.get("X-TRACE"), Some("a"));
        let keys: Vec<_> = header.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["Sec-WebSocket-Protocol", "X-Trace", "x-trace"]);
    }
}
