//! Connection role (client or server).

/// Which end of the connection this side is.
///
/// Determines masking behavior per RFC 6455: clients mask every outgoing
/// frame and expect unmasked frames back, servers the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Client role - must mask outgoing frames.
    Client,
    /// Server role - must not mask outgoing frames.
    Server,
}

impl Role {
    /// Check if this role must mask outgoing frames.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Check if this role expects incoming frames to be masked.
    #[inline]
    #[must_use]
    pub const fn expects_masked(&self) -> bool {
        matches!(self, Role::Server)
    }

    /// The role of the other end.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_rules() {
        assert!(Role::Client.must_mask());
        assert!(!Role::Server.must_mask());
        assert!(Role::Server.expects_masked());
        assert!(!Role::Client.expects_masked());
    }

    #[test]
    fn test_peer_role() {
        assert_eq!(Role::Client.peer(), Role::Server);
        assert_eq!(Role::Server.peer(), Role::Client);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Client.to_string(), "client");
        assert_eq!(Role::Server.to_string(), "server");
    }
}
