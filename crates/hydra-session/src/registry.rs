//! The server-side session registry.
//!
//! Assigns ids to accepted sockets, keeps a handle per live session, and
//! removes sessions once they stop.
//!
//! # Concurrency note
//!
//! `SessionRegistry` uses a plain `HashMap`. It is owned by the server's
//! accept task on the reactor, and every other thread reaches it through
//! that task's command channel.

use std::collections::HashMap;
use std::sync::Arc;

use hydra_protocol::NetworkMessage;
use hydra_transport::SessionId;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::{
    EventSender, MessageHandler, SessionConfig, SessionError, SessionEvent, SessionHandle,
    TcpSession,
};

/// Forwards session output to the event queue and tells the registry
/// when a session stops.
struct RegistryHandler {
    events: EventSender,
    stopped: mpsc::UnboundedSender<SessionId>,
}

impl MessageHandler for RegistryHandler {
    fn on_messages_received(&self, session: SessionId, messages: Vec<NetworkMessage>) {
        self.events.send(SessionEvent::Messages { session, messages });
    }

    fn on_session_stopped(&self, session: SessionId, _error: Option<&SessionError>) {
        let _ = self.stopped.send(session);
    }
}

/// Tracks every live session on a server.
///
/// ```text
/// create_session() ──→ [live] ──→ stop / error ──→ reap() ──→ Destroyed
/// ```
pub struct SessionRegistry {
    sessions: HashMap<SessionId, SessionHandle>,

    /// Next id to hand out. Starts at 0 and is never reused.
    next_id: u64,

    config: SessionConfig,
    events: EventSender,
    stopped_tx: mpsc::UnboundedSender<SessionId>,
    stopped_rx: mpsc::UnboundedReceiver<SessionId>,
}

impl SessionRegistry {
    /// Creates an empty registry that reports to `events`.
    pub fn new(config: SessionConfig, events: EventSender) -> Self {
        let (stopped_tx, stopped_rx) = mpsc::unbounded_channel();
        Self {
            sessions: HashMap::new(),
            next_id: 0,
            config: config.validated(),
            events,
            stopped_tx,
            stopped_rx,
        }
    }

    /// Registers `stream` under a fresh id and starts its session.
    ///
    /// Posts [`SessionEvent::Created`] before the session can read, so it
    /// is always seen ahead of that session's messages. Must be called on
    /// the reactor.
    pub fn create_session(&mut self, stream: TcpStream) -> SessionId {
        let id = SessionId::new(self.next_id);
        self.next_id += 1;

        self.events.send(SessionEvent::Created(id));

        let handler = Arc::new(RegistryHandler {
            events: self.events.clone(),
            stopped: self.stopped_tx.clone(),
        });
        let handle = TcpSession::new(id, stream, self.config.clone(), handler).start();
        self.sessions.insert(id, handle);

        tracing::info!(session = %id, sessions = self.sessions.len(), "session created");
        id
    }

    /// Looks up a live session.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] (and logs it) if `id` isn't
    /// registered.
    pub fn get(&self, id: SessionId) -> Result<&SessionHandle, SessionError> {
        self.sessions.get(&id).ok_or_else(|| {
            tracing::error!(session = %id, "no session with this id");
            SessionError::NotFound(id)
        })
    }

    /// Queues raw bytes on session `id`.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if `id` isn't registered.
    pub fn write(&self, id: SessionId, payload: impl Into<Vec<u8>>) -> Result<(), SessionError> {
        self.get(id)?.write(payload);
        Ok(())
    }

    /// Stops session `id`. It is removed once it has actually stopped.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if `id` isn't registered.
    pub fn destroy_session(&self, id: SessionId) -> Result<(), SessionError> {
        self.get(id)?.stop();
        tracing::debug!(session = %id, "session stop requested");
        Ok(())
    }

    /// Stops every session.
    pub fn destroy_all(&self) {
        tracing::info!(sessions = self.sessions.len(), "stopping all sessions");
        for handle in self.sessions.values() {
            handle.stop();
        }
    }

    /// Waits for the next session to stop, removes it, and returns its id.
    ///
    /// Cancel safe, so it can sit in a `select!` loop.
    pub async fn reap(&mut self) -> Option<SessionId> {
        loop {
            let id = self.stopped_rx.recv().await?;
            if self.remove(id) {
                return Some(id);
            }
        }
    }

    /// Removes every session that has already stopped.
    pub fn prune_stopped(&mut self) -> Vec<SessionId> {
        let mut removed = Vec::new();
        while let Ok(id) = self.stopped_rx.try_recv() {
            if self.remove(id) {
                removed.push(id);
            }
        }
        removed
    }

    fn remove(&mut self, id: SessionId) -> bool {
        if self.sessions.remove(&id).is_none() {
            return false;
        }
        self.events.send(SessionEvent::Destroyed(id));
        tracing::info!(session = %id, sessions = self.sessions.len(), "session destroyed");
        true
    }

    /// Ids of all live sessions, in ascending order.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Returns `true` if `id` is registered.
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;
    use crate::{event_queue, EventQueue};

    fn registry() -> (SessionRegistry, EventQueue) {
        let (events, queue) = event_queue();
        (SessionRegistry::new(SessionConfig::default(), events), queue)
    }

    async fn accepted_stream(listener: &TcpListener) -> (TcpStream, TcpStream) {
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (accepted.unwrap().0, client.unwrap())
    }

    #[tokio::test]
    async fn test_create_session_assigns_ids_from_zero() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (mut registry, mut queue) = registry();

        let (a, _pa) = accepted_stream(&listener).await;
        let (b, _pb) = accepted_stream(&listener).await;
        let first = registry.create_session(a);
        let second = registry.create_session(b);

        assert_eq!(first, SessionId::new(0));
        assert_eq!(second, SessionId::new(1));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec![first, second]);
        assert_eq!(
            queue.drain(),
            vec![SessionEvent::Created(first), SessionEvent::Created(second)]
        );
    }

    #[tokio::test]
    async fn test_get_unknown_session_not_found() {
        let (registry, _queue) = registry();
        let result = registry.get(SessionId::new(42));
        assert!(matches!(result, Err(SessionError::NotFound(id)) if id == SessionId::new(42)));
    }

    #[tokio::test]
    async fn test_destroy_unknown_session_not_found() {
        let (registry, _queue) = registry();
        assert!(registry.destroy_session(SessionId::new(5)).is_err());
        assert!(registry.write(SessionId::new(5), b"x".to_vec()).is_err());
    }

    #[tokio::test]
    async fn test_destroy_session_then_reap_removes_it() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (mut registry, mut queue) = registry();
        let (stream, _peer) = accepted_stream(&listener).await;
        let id = registry.create_session(stream);

        registry.destroy_session(id).unwrap();
        let reaped = tokio::time::timeout(Duration::from_secs(5), registry.reap())
            .await
            .unwrap();

        assert_eq!(reaped, Some(id));
        assert!(registry.is_empty());
        assert!(!registry.contains(id));
        assert_eq!(
            queue.drain(),
            vec![SessionEvent::Created(id), SessionEvent::Destroyed(id)]
        );
    }

    #[tokio::test]
    async fn test_prune_stopped_after_peer_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (mut registry, _queue) = registry();
        let (stream, peer) = accepted_stream(&listener).await;
        let id = registry.create_session(stream);

        drop(peer);
        let handle = registry.get(id).unwrap().clone();
        tokio::time::timeout(Duration::from_secs(5), handle.stopped())
            .await
            .unwrap();
        // The stop notice is sent right after the state flips.
        tokio::task::yield_now().await;

        assert_eq!(registry.prune_stopped(), vec![id]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_destroy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (mut registry, _queue) = registry();

        let (a, _pa) = accepted_stream(&listener).await;
        let first = registry.create_session(a);
        registry.destroy_session(first).unwrap();
        registry.reap().await;

        let (b, _pb) = accepted_stream(&listener).await;
        let second = registry.create_session(b);
        assert_eq!(second, SessionId::new(1));
    }
}
