//! Transport layer for Hydra.
//!
//! Provides the pieces that touch the operating system's networking:
//!
//! - [`Reactor`]: the single background thread all socket work runs on
//! - [`TcpTransport`]: accepting connected sockets
//! - [`connect`] / [`ReconnectPolicy`]: the client's connect loop
//! - [`SessionId`]: identity of one connected socket

mod connector;
mod error;
mod reactor;
mod tcp;

pub use connector::{connect, ReconnectPolicy};
pub use error::TransportError;
pub use reactor::Reactor;
pub use tcp::TcpTransport;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for one connected session.
///
/// On the server this is the client id: assigned from a per-registry
/// counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a new `SessionId` from a raw `u64`.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_round_trips_counter_value() {
        assert_eq!(SessionId::new(42).into_inner(), 42);
    }

    #[test]
    fn test_session_id_display_prefixes_counter() {
        assert_eq!(SessionId::new(7).to_string(), "session-7");
        assert_eq!(SessionId::new(0).to_string(), "session-0");
    }

    #[test]
    fn test_session_id_order_matches_allocation_order() {
        let mut ids: Vec<SessionId> = [3, 0, 2, 1].into_iter().map(SessionId::new).collect();
        ids.sort();
        assert_eq!(ids, (0..4).map(SessionId::new).collect::<Vec<_>>());
    }

    #[test]
    fn test_session_id_serializes_as_bare_number() {
        let id: SessionId = serde_json::from_str("5").unwrap();
        assert_eq!(id, SessionId::new(5));
        assert_eq!(serde_json::to_string(&id).unwrap(), "5");
    }
}
