//! The callback seam between a session and whoever owns it.

use hydra_protocol::NetworkMessage;
use hydra_transport::SessionId;

use crate::SessionError;

/// Receives what a session produces.
///
/// Both methods are called on the reactor thread, so implementations
/// should hand the data off (e.g. through a channel) rather than do
/// heavy work inline.
pub trait MessageHandler: Send + Sync + 'static {
    /// Called with every batch of messages completed by one socket read,
    /// in stream order. Never called with an empty batch.
    fn on_messages_received(&self, session: SessionId, messages: Vec<NetworkMessage>);

    /// Called exactly once when the session stops.
    ///
    /// `error` is `None` when the stop was requested locally.
    fn on_session_stopped(&self, session: SessionId, error: Option<&SessionError>) {
        let _ = (session, error);
    }
}

impl<F> MessageHandler for F
where
    F: Fn(SessionId, Vec<NetworkMessage>) + Send + Sync + 'static,
{
    fn on_messages_received(&self, session: SessionId, messages: Vec<NetworkMessage>) {
        self(session, messages)
    }
}
