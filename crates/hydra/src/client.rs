//! `GameClient` builder and connect loop.
//!
//! The client owns its own [`Reactor`]. One task on it connects to the
//! server (retrying refused connections per [`ReconnectPolicy`]), then
//! runs a single session. Messages sent before the connection exists are
//! held and flushed, in order, as soon as it does.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hydra_protocol::NetworkMessage;
use hydra_session::{
    event_queue, EventQueue, EventSender, SessionConfig, SessionEvent, SessionHandle,
    TcpSession,
};
use hydra_transport::{connect, ReconnectPolicy, Reactor, SessionId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::HydraError;
use crate::server::DEFAULT_BIND_ADDR;

/// How long [`GameClient::stop`] waits for the session to close.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The id the client uses for its one session.
pub const SERVER_SESSION_ID: SessionId = SessionId::new(0);

#[derive(Debug)]
enum ClientCommand {
    Write(Vec<u8>),
    Shutdown(std::sync::mpsc::SyncSender<()>),
}

/// Builder for configuring and starting a [`GameClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameClientBuilder {
    server_addr: String,
    reconnect: ReconnectPolicy,
    session_config: SessionConfig,
    reactor_name: String,
}

impl GameClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            server_addr: DEFAULT_BIND_ADDR.to_string(),
            reconnect: ReconnectPolicy::default(),
            session_config: SessionConfig::default(),
            reactor_name: "hydra-client".to_string(),
        }
    }

    /// Sets the server address to connect to.
    pub fn server_addr(mut self, addr: &str) -> Self {
        self.server_addr = addr.to_string();
        self
    }

    /// Sets how refused connections are retried.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Names the reactor thread.
    pub fn reactor_name(mut self, name: &str) -> Self {
        self.reactor_name = name.to_string();
        self
    }

    /// Starts the reactor and the connect loop. Returns immediately;
    /// watch [`GameClient::events`] for [`SessionEvent::Created`].
    ///
    /// # Errors
    /// Returns [`HydraError::Transport`] if the reactor can't start.
    pub fn start(self) -> Result<GameClient, HydraError> {
        let reactor = Reactor::start(&self.reactor_name)?;
        let (event_tx, events) = event_queue();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        reactor.spawn(client_loop(
            self.server_addr.clone(),
            self.reconnect,
            self.session_config,
            event_tx,
            command_rx,
            Arc::clone(&connected),
        ));

        Ok(GameClient {
            server_addr: self.server_addr,
            commands: command_tx,
            events,
            connected,
            reactor: Some(reactor),
        })
    }
}

impl Default for GameClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A game client with at most one connection to a server.
///
/// The client does not reconnect after the connection is lost; once its
/// session stops, [`is_running`](Self::is_running) turns `false`.
/// Dropping the client stops it.
pub struct GameClient {
    server_addr: String,
    commands: mpsc::UnboundedSender<ClientCommand>,
    events: EventQueue,
    connected: Arc<AtomicBool>,
    reactor: Option<Reactor>,
}

impl GameClient {
    /// Creates a new builder.
    pub fn builder() -> GameClientBuilder {
        GameClientBuilder::new()
    }

    /// The address this client connects to.
    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    /// Queues raw bytes for the server. Held until connected.
    ///
    /// # Errors
    /// Returns [`HydraError::NotRunning`] once the client has stopped or
    /// lost its connection.
    pub fn post_message_to_server(&self, payload: impl Into<Vec<u8>>) -> Result<(), HydraError> {
        self.commands
            .send(ClientCommand::Write(payload.into()))
            .map_err(|_| HydraError::NotRunning("client"))
    }

    /// Frames `message` and queues it for the server.
    ///
    /// # Errors
    /// Returns [`HydraError::NotRunning`] once the client has stopped or
    /// lost its connection.
    pub fn send_message(&self, message: &NetworkMessage) -> Result<(), HydraError> {
        self.post_message_to_server(message.encode())
    }

    /// Returns `true` while a session with the server is open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Returns `true` while connecting or connected.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed() && self.reactor.as_ref().is_some_and(Reactor::is_running)
    }

    /// The queue of session events. Drain it from the owner thread.
    pub fn events(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Closes the connection (or abandons connecting) and shuts the
    /// reactor down. Safe to call more than once.
    pub fn stop(&mut self) {
        let Some(reactor) = self.reactor.take() else {
            return;
        };

        let (done_tx, done_rx) = std::sync::mpsc::sync_channel(1);
        if self.commands.send(ClientCommand::Shutdown(done_tx)).is_ok()
            && done_rx.recv_timeout(SHUTDOWN_TIMEOUT).is_err()
        {
            tracing::warn!("session did not close in time, dropping it");
        }

        reactor.shutdown();
        self.connected.store(false, Ordering::Release);
        tracing::info!(addr = %self.server_addr, "game client stopped");
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Connects, then pumps owner-thread commands into the session.
async fn client_loop(
    addr: String,
    policy: ReconnectPolicy,
    config: SessionConfig,
    events: EventSender,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    connected: Arc<AtomicBool>,
) {
    let mut pending = VecDeque::new();

    let connecting = connect(&addr, &policy);
    tokio::pin!(connecting);

    let stream = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok(stream) => break stream,
                Err(e) => {
                    tracing::error!(%addr, error = %e, "could not connect to server");
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(ClientCommand::Write(payload)) => pending.push_back(payload),
                Some(ClientCommand::Shutdown(done)) => {
                    tracing::debug!(%addr, "connect abandoned");
                    let _ = done.send(());
                    return;
                }
                None => return,
            },
        }
    };

    events.send(SessionEvent::Created(SERVER_SESSION_ID));
    let handle = TcpSession::new(
        SERVER_SESSION_ID,
        stream,
        config,
        Arc::new(events),
    )
    .start();
    connected.store(true, Ordering::Release);

    if !pending.is_empty() {
        tracing::debug!(count = pending.len(), "flushing writes queued while connecting");
    }
    for payload in pending.drain(..) {
        handle.write(payload);
    }

    serve(&handle, &mut commands).await;
    connected.store(false, Ordering::Release);
}

/// Forwards commands to the session until it stops or shutdown is
/// requested.
async fn serve(handle: &SessionHandle, commands: &mut mpsc::UnboundedReceiver<ClientCommand>) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ClientCommand::Write(payload)) => handle.write(payload),
                Some(ClientCommand::Shutdown(done)) => {
                    handle.stop();
                    handle.stopped().await;
                    let _ = done.send(());
                    return;
                }
                None => {
                    handle.stop();
                    handle.stopped().await;
                    return;
                }
            },
            () = handle.stopped() => {
                tracing::info!(session = %handle.id(), "disconnected from server");
                return;
            }
        }
    }
}
