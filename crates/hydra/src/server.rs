//! `GameServer` builder and accept loop.
//!
//! The server owns a [`Reactor`]. On it runs one accept task that holds
//! the listener and the [`SessionRegistry`], plus one task per session.
//! The thread that built the server (usually the game loop) talks to the
//! accept task through a command channel and reads what the sessions
//! produce from an [`EventQueue`].
//!
//! ```text
//!  owner thread                       reactor thread
//!  ────────────                       ──────────────
//!  post_message_to_client ──cmd──▶  accept task ──▶ SessionRegistry ──▶ sessions
//!  events().drain()       ◀─────────────── SessionEvent ◀──────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hydra_protocol::NetworkMessage;
use hydra_session::{event_queue, EventQueue, SessionConfig, SessionRegistry};
use hydra_transport::{Reactor, SessionId, TcpTransport, TransportError};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::HydraError;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:26000";

/// How long [`GameServer::stop`] waits for sessions to close.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Requests from the owner thread to the accept task.
#[derive(Debug)]
enum ServerCommand {
    Write { session: SessionId, payload: Vec<u8> },
    Destroy(SessionId),
    DestroyAll,
    Shutdown(std::sync::mpsc::SyncSender<()>),
}

/// Builder for configuring and starting a [`GameServer`].
///
/// # Example
///
/// ```rust,no_run
/// use hydra::prelude::*;
///
/// let mut server = GameServer::builder().bind("0.0.0.0:26000").build()?;
/// loop {
///     for event in server.events().drain() {
///         // handle SessionEvent::Created / Messages / Destroyed
///     }
///     # break;
/// }
/// server.stop();
/// # Ok::<(), HydraError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    reactor_name: String,
}

impl GameServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            session_config: SessionConfig::default(),
            reactor_name: "hydra-server".to_string(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every accepted session uses.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Names the reactor thread.
    pub fn reactor_name(mut self, name: &str) -> Self {
        self.reactor_name = name.to_string();
        self
    }

    /// Binds the listener, starts the reactor, and begins accepting.
    ///
    /// Binding happens on the calling thread, so an address already in
    /// use is reported here.
    ///
    /// # Errors
    /// Returns [`HydraError::Transport`] if binding or starting the
    /// reactor fails.
    pub fn build(self) -> Result<GameServer, HydraError> {
        let listener = TcpTransport::bind_std(&self.bind_addr)?;
        let local_addr = listener.local_addr().map_err(TransportError::BindFailed)?;

        let reactor = Reactor::start(&self.reactor_name)?;
        let transport = {
            let _guard = reactor.handle().enter();
            TcpTransport::from_std(listener)?
        };

        let (event_tx, events) = event_queue();
        let registry = SessionRegistry::new(self.session_config, event_tx);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));

        reactor.spawn(accept_loop(
            transport,
            registry,
            command_rx,
            Arc::clone(&connections),
        ));

        tracing::info!(%local_addr, "game server started");
        Ok(GameServer {
            local_addr,
            commands: command_tx,
            events,
            connections,
            reactor: Some(reactor),
        })
    }
}

impl Default for GameServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running game server.
///
/// Dropping the server stops it.
pub struct GameServer {
    local_addr: SocketAddr,
    commands: mpsc::UnboundedSender<ServerCommand>,
    events: EventQueue,
    connections: Arc<AtomicUsize>,
    reactor: Option<Reactor>,
}

impl GameServer {
    /// Creates a new builder.
    pub fn builder() -> GameServerBuilder {
        GameServerBuilder::new()
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queues raw bytes for client `id`.
    ///
    /// An unknown id is logged on the reactor and otherwise ignored.
    ///
    /// # Errors
    /// Returns [`HydraError::NotRunning`] after [`stop`](Self::stop).
    pub fn post_message_to_client(
        &self,
        id: SessionId,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), HydraError> {
        self.command(ServerCommand::Write {
            session: id,
            payload: payload.into(),
        })
    }

    /// Frames `message` and queues it for client `id`.
    ///
    /// # Errors
    /// Returns [`HydraError::NotRunning`] after [`stop`](Self::stop).
    pub fn send_message(
        &self,
        id: SessionId,
        message: &NetworkMessage,
    ) -> Result<(), HydraError> {
        self.post_message_to_client(id, message.encode())
    }

    /// Disconnects client `id`. A
    /// [`SessionEvent::Destroyed`](hydra_session::SessionEvent::Destroyed) follows
    /// once the socket is closed.
    ///
    /// # Errors
    /// Returns [`HydraError::NotRunning`] after [`stop`](Self::stop).
    pub fn destroy_session(&self, id: SessionId) -> Result<(), HydraError> {
        self.command(ServerCommand::Destroy(id))
    }

    /// Disconnects every client.
    ///
    /// # Errors
    /// Returns [`HydraError::NotRunning`] after [`stop`](Self::stop).
    pub fn destroy_all_sessions(&self) -> Result<(), HydraError> {
        self.command(ServerCommand::DestroyAll)
    }

    /// Number of clients currently connected.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Returns `true` until the server is stopped.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed() && self.reactor.as_ref().is_some_and(Reactor::is_running)
    }

    /// The queue of session events. Drain it from the owner thread.
    pub fn events(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Stops accepting, closes every session, and shuts the reactor down.
    ///
    /// Blocks until the sessions have closed (bounded by a timeout).
    /// Safe to call more than once.
    pub fn stop(&mut self) {
        let Some(reactor) = self.reactor.take() else {
            return;
        };

        let (done_tx, done_rx) = std::sync::mpsc::sync_channel(1);
        if self.commands.send(ServerCommand::Shutdown(done_tx)).is_ok()
            && done_rx.recv_timeout(SHUTDOWN_TIMEOUT).is_err()
        {
            tracing::warn!("sessions did not close in time, dropping them");
        }

        reactor.shutdown();
        self.connections.store(0, Ordering::Relaxed);
        tracing::info!(addr = %self.local_addr, "game server stopped");
    }

    fn command(&self, command: ServerCommand) -> Result<(), HydraError> {
        self.commands
            .send(command)
            .map_err(|_| HydraError::NotRunning("server"))
    }
}

impl Drop for GameServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Accepts connections and serves owner-thread commands until shutdown.
async fn accept_loop(
    mut transport: TcpTransport,
    mut registry: SessionRegistry,
    mut commands: mpsc::UnboundedReceiver<ServerCommand>,
    connections: Arc<AtomicUsize>,
) {
    tracing::info!("accept loop running");

    let done = loop {
        tokio::select! {
            accepted = transport.accept() => match accepted {
                Ok((stream, addr)) => {
                    let id = registry.create_session(stream);
                    connections.store(registry.len(), Ordering::Relaxed);
                    tracing::info!(session = %id, %addr, "client connected");
                }
                Err(e) => tracing::error!(error = %e, "accept failed"),
            },

            command = commands.recv() => match command {
                Some(ServerCommand::Write { session, payload }) => {
                    let _ = registry.write(session, payload);
                }
                Some(ServerCommand::Destroy(session)) => {
                    let _ = registry.destroy_session(session);
                }
                Some(ServerCommand::DestroyAll) => registry.destroy_all(),
                Some(ServerCommand::Shutdown(done)) => break Some(done),
                None => break None,
            },

            Some(id) = registry.reap() => {
                connections.store(registry.len(), Ordering::Relaxed);
                tracing::debug!(session = %id, "client removed");
            }
        }
    };

    drop(transport);
    tracing::debug!("listener closed");

    registry.destroy_all();
    while !registry.is_empty() {
        if registry.reap().await.is_none() {
            break;
        }
    }
    connections.store(0, Ordering::Relaxed);
    tracing::info!("accept loop stopped");

    if let Some(done) = done {
        let _ = done.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = GameServerBuilder::default();
        assert_eq!(builder.bind_addr, "127.0.0.1:26000");
        assert_eq!(builder.session_config, SessionConfig::default());
        assert_eq!(builder.reactor_name, "hydra-server");
    }

    #[test]
    fn test_build_then_stop_twice() {
        let mut server = GameServer::builder().bind("127.0.0.1:0").build().unwrap();
        assert!(server.is_running());
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.connection_count(), 0);

        server.stop();
        server.stop();
        assert!(!server.is_running());
    }

    #[test]
    fn test_commands_after_stop_not_running() {
        let mut server = GameServer::builder().bind("127.0.0.1:0").build().unwrap();
        server.stop();

        let result = server.post_message_to_client(SessionId::new(0), b"hi".to_vec());
        assert!(matches!(result, Err(HydraError::NotRunning("server"))));
        assert!(server.destroy_all_sessions().is_err());
    }

    #[test]
    fn test_build_address_in_use_fails() {
        let first = GameServer::builder().bind("127.0.0.1:0").build().unwrap();
        let addr = first.local_addr().to_string();

        let second = GameServer::builder().bind(&addr).build();
        assert!(matches!(
            second,
            Err(HydraError::Transport(TransportError::BindFailed(_)))
        ));
    }

    #[test]
    fn test_stop_closes_listener() {
        let mut server = GameServer::builder().bind("127.0.0.1:0").build().unwrap();
        let addr = server.local_addr();

        server.stop();

        assert!(std::net::TcpStream::connect(addr).is_err());
    }

    #[test]
    fn test_unknown_session_is_not_fatal() {
        let server = GameServer::builder().bind("127.0.0.1:0").build().unwrap();
        server
            .post_message_to_client(SessionId::new(99), b"nobody".to_vec())
            .unwrap();
        server.destroy_session(SessionId::new(99)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(server.is_running());
    }
}
