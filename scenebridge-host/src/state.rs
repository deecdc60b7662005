//! Socket backend lifecycle state

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

/// Lifecycle of the socket backend
///
/// `Idle -> Listening -> Connected -> (Connected <-> Executing) -> Closed`.
/// A connection that ends returns the backend to `Listening`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeState {
    /// Not yet bound
    Idle,
    /// Bound and waiting for a client
    Listening { addr: SocketAddr },
    /// A client is attached and no command is running
    Connected {
        peer: SocketAddr,
        since: Instant,
        last_activity: Instant,
    },
    /// A command from the client is running on the host thread
    Executing {
        peer: SocketAddr,
        command: String,
        since: Instant,
    },
    /// Stopped; the listener has been dropped
    Closed,
}

impl BridgeState {
    pub fn connected(peer: SocketAddr) -> Self {
        let now = Instant::now();
        Self::Connected {
            peer,
            since: now,
            last_activity: now,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening { .. } => "listening",
            Self::Connected { .. } => "connected",
            Self::Executing { .. } => "executing",
            Self::Closed => "closed",
        }
    }

    /// Peer of the active connection, if any
    pub fn peer(&self) -> Option<SocketAddr> {
        match self {
            Self::Connected { peer, .. } | Self::Executing { peer, .. } => Some(*peer),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.peer().is_some()
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listening { addr } => write!(f, "listening on {}", addr),
            Self::Connected { peer, .. } => write!(f, "connected to {}", peer),
            Self::Executing { peer, command, .. } => {
                write!(f, "executing '{}' for {}", command, peer)
            }
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_names() {
        assert_eq!(BridgeState::Idle.name(), "idle");
        assert_eq!(BridgeState::Listening { addr: addr(9876) }.name(), "listening");
        assert_eq!(BridgeState::connected(addr(50000)).name(), "connected");
        assert_eq!(BridgeState::Closed.name(), "closed");
    }

    #[test]
    fn test_peer() {
        assert_eq!(BridgeState::Idle.peer(), None);
        assert_eq!(BridgeState::Listening { addr: addr(9876) }.peer(), None);
        assert_eq!(BridgeState::connected(addr(50000)).peer(), Some(addr(50000)));

        let executing = BridgeState::Executing {
            peer: addr(50001),
            command: "get_layers".into(),
            since: Instant::now(),
        };
        assert!(executing.is_connected());
        assert_eq!(executing.peer(), Some(addr(50001)));
    }

    #[test]
    fn test_connected_timestamps_start_equal() {
        if let BridgeState::Connected {
            since,
            last_activity,
            ..
        } = BridgeState::connected(addr(1))
        {
            assert_eq!(since, last_activity);
        } else {
            panic!("Expected Connected");
        }
    }

    #[test]
    fn test_display() {
        let executing = BridgeState::Executing {
            peer: addr(50001),
            command: "create_cube".into(),
            since: Instant::now(),
        };
        assert_eq!(executing.to_string(), "executing 'create_cube' for 127.0.0.1:50001");
        assert_eq!(BridgeState::Closed.to_string(), "closed");
    }
}
