//! Unified error type for Hydra.

use hydra_protocol::ProtocolError;
use hydra_session::SessionError;
use hydra_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `hydra` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum HydraError {
    /// A transport-level error (bind, connect, socket I/O).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (framing, payload encoding).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown session, session failure).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server or client was already stopped.
    #[error("{0} is not running")]
    NotRunning(&'static str),
}

#[cfg(test)]
mod tests {
    use hydra_transport::SessionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let hydra_err: HydraError = err.into();
        assert!(matches!(hydra_err, HydraError::Transport(_)));
        assert!(hydra_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::FrameTooLarge { length: 10, max: 5 };
        let hydra_err: HydraError = err.into();
        assert!(matches!(hydra_err, HydraError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::NotFound(SessionId::new(3));
        let hydra_err: HydraError = err.into();
        assert!(matches!(hydra_err, HydraError::Session(_)));
        assert!(hydra_err.to_string().contains("session-3"));
    }

    #[test]
    fn test_not_running_display() {
        let err = HydraError::NotRunning("server");
        assert_eq!(err.to_string(), "server is not running");
    }
}
