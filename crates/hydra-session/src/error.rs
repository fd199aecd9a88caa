//! Error types for the session layer.

use hydra_protocol::ProtocolError;
use hydra_transport::{SessionId, TransportError};

/// Errors that can occur while running or looking up a session.
///
/// Every variant except [`NotFound`](Self::NotFound) is fatal to the
/// session it came from: the socket is closed and the error is reported
/// once through
/// [`MessageHandler::on_session_stopped`](crate::MessageHandler::on_session_stopped).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session is registered under this id.
    ///
    /// Either it never existed or it already stopped and was pruned.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The peer sent bytes the framer refused (oversized frame).
    #[error("framing error: {0}")]
    Framing(#[from] ProtocolError),

    /// The socket failed or the peer closed it.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Returns `true` if the peer closed the connection cleanly.
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, Self::Transport(TransportError::ConnectionClosed(_)))
    }
}
