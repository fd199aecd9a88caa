//! Hand-off of session events from the reactor to the owner thread.
//!
//! Sessions report on the reactor thread. The game loop that consumes
//! messages runs elsewhere and polls an [`EventQueue`] once per frame.
//! The reactor side holds an [`EventSender`], which is also a
//! [`MessageHandler`] so it can be plugged straight into a session.
//!
//! A blocking [`EventQueue::recv_timeout`] parks the owner thread on a
//! condition variable that every send, and the last sender's drop,
//! signals.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use hydra_protocol::NetworkMessage;
use hydra_transport::SessionId;
use tokio::sync::mpsc;

use crate::{MessageHandler, SessionError};

/// Something that happened to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was registered. Always precedes its messages.
    Created(SessionId),

    /// A batch of messages from one read, in stream order.
    Messages {
        session: SessionId,
        messages: Vec<NetworkMessage>,
    },

    /// A session stopped and was removed. Always its last event.
    Destroyed(SessionId),
}

/// Creates a connected sender/queue pair.
pub fn event_queue() -> (EventSender, EventQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    let wakeup = Arc::new(Wakeup::default());
    (
        EventSender {
            tx: Some(tx),
            wakeup: Arc::clone(&wakeup),
        },
        EventQueue { rx, wakeup },
    )
}

/// Parks a thread blocked in [`EventQueue::recv_timeout`].
#[derive(Debug, Default)]
struct Wakeup {
    lock: Mutex<()>,
    ready: Condvar,
}

impl Wakeup {
    /// Must be called after the channel changed, never before.
    fn notify(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ready.notify_all();
    }
}

/// Reactor-side end of the event channel.
#[derive(Debug)]
pub struct EventSender {
    // `None` only while dropping.
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
    wakeup: Arc<Wakeup>,
}

impl EventSender {
    /// Posts an event. Dropped silently if the queue is gone.
    pub fn send(&self, event: SessionEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(event).is_err() {
            tracing::trace!("event queue closed, dropping event");
            return;
        }
        self.wakeup.notify();
    }
}

impl Clone for EventSender {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            wakeup: Arc::clone(&self.wakeup),
        }
    }
}

impl Drop for EventSender {
    fn drop(&mut self) {
        // Close our half first so a waiter can observe the disconnect.
        drop(self.tx.take());
        self.wakeup.notify();
    }
}

impl MessageHandler for EventSender {
    fn on_messages_received(&self, session: SessionId, messages: Vec<NetworkMessage>) {
        self.send(SessionEvent::Messages { session, messages });
    }

    fn on_session_stopped(&self, session: SessionId, _error: Option<&SessionError>) {
        self.send(SessionEvent::Destroyed(session));
    }
}

/// Owner-side end of the event channel.
#[derive(Debug)]
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    wakeup: Arc<Wakeup>,
}

impl EventQueue {
    /// Takes the next event if one is ready.
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }

    /// Takes every event that is ready, oldest first.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Waits for the next event. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Blocks the calling thread for up to `timeout` waiting for an event.
    ///
    /// Must not be called from inside an async runtime.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<SessionEvent> {
        let deadline = Instant::now() + timeout;
        let wakeup = Arc::clone(&self.wakeup);
        let mut guard = wakeup.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            // Senders notify under the lock, so nothing sent after this
            // check can slip past the wait below.
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(mpsc::error::TryRecvError::Disconnected) => return None,
                Err(mpsc::error::TryRecvError::Empty) => {}
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return None;
            }
            guard = wakeup
                .ready
                .wait_timeout(guard, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Waits until `predicate` matches an event, discarding the ones
    /// before it. Gives up after `timeout`.
    pub fn wait_for(
        &mut self,
        timeout: Duration,
        mut predicate: impl FnMut(&SessionEvent) -> bool,
    ) -> Option<SessionEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let event = self.recv_timeout(left)?;
            if predicate(&event) {
                return Some(event);
            }
        }
    }
}
