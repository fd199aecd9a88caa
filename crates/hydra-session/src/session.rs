//! The per-connection I/O pump.
//!
//! A [`TcpSession`] owns one connected socket. Once started it runs as a
//! single task on the reactor that does three things:
//!
//! - keeps exactly one read outstanding, feeding what arrives to its
//!   [`MessageParser`] and handing completed messages to the
//!   [`MessageHandler`]
//! - drains a FIFO write queue with at most one write in flight
//! - listens for commands ([`SessionHandle::write`], [`SessionHandle::stop`])
//!
//! ```text
//!            ┌──────────── SessionHandle (any thread)
//!            │ Write / Stop
//!            ▼
//!   ┌─────────────────┐   read    ┌──────────────┐  messages  ┌─────────┐
//!   │  session task   │ ───────▶  │ MessageParser │ ────────▶ │ handler │
//!   │   (reactor)     │           └──────────────┘            └─────────┘
//!   │                 │   write (front of queue, one at a time)
//!   └─────────────────┘ ───────▶ socket
//! ```
//!
//! Any read error, write error, peer close or framing error stops the
//! session. Stopping closes the socket, drops whatever is still queued,
//! and reports once through [`MessageHandler::on_session_stopped`].

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use hydra_protocol::{MessageParser, NetworkMessage};
use hydra_transport::{SessionId, TransportError};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, watch};

use crate::{MessageHandler, SessionConfig, SessionError};

/// Lifecycle of a session. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Constructed, not yet reading.
    NotStarted,
    /// Reading and writing.
    Running,
    /// Socket closed. Terminal.
    Stopped,
}

/// Commands accepted by the session task.
#[derive(Debug)]
enum SessionCommand {
    Write(Vec<u8>),
    Stop,
}

/// A connected socket that hasn't started pumping yet.
pub struct TcpSession {
    id: SessionId,
    stream: TcpStream,
    config: SessionConfig,
    handler: Arc<dyn MessageHandler>,
}

impl TcpSession {
    /// Wraps a connected stream. Nothing is read until [`start`](Self::start).
    pub fn new(
        id: SessionId,
        stream: TcpStream,
        config: SessionConfig,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            id,
            stream,
            config: config.validated(),
            handler,
        }
    }

    /// The session's id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Spawns the session task and returns a handle to it.
    ///
    /// Must be called from within the runtime the stream was registered
    /// with (the reactor).
    pub fn start(self) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::NotStarted);

        let task = SessionTask {
            id: self.id,
            handler: self.handler,
            parser: MessageParser::with_capacity_and_max_payload(
                self.config.parser_reserve,
                self.config.max_payload_size,
            ),
            read_buf: vec![0; self.config.read_buffer_size],
            inbox: Vec::new(),
            write_queue: VecDeque::new(),
            written: 0,
            commands: command_rx,
            state: state_tx,
        };
        tokio::spawn(task.run(self.stream));

        SessionHandle {
            id: self.id,
            commands: command_tx,
            state: state_rx,
        }
    }
}

/// Handle to a running session. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// The session's id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queues raw bytes for sending. Never blocks.
    ///
    /// Payloads go out in the order they were queued, each fully written
    /// before the next one starts. Empty payloads are ignored. Writes
    /// after the session stopped are silently dropped.
    pub fn write(&self, payload: impl Into<Vec<u8>>) {
        if self
            .commands
            .send(SessionCommand::Write(payload.into()))
            .is_err()
        {
            tracing::trace!(session = %self.id, "write after stop discarded");
        }
    }

    /// Frames `message` and queues it for sending.
    pub fn send_message(&self, message: &NetworkMessage) {
        self.write(message.encode());
    }

    /// Requests the session to stop. Idempotent.
    pub fn stop(&self) {
        let _ = self.commands.send(SessionCommand::Stop);
    }

    /// The last state the session published.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Returns `true` once the session task has finished.
    pub fn is_stopped(&self) -> bool {
        self.state() == SessionState::Stopped || self.commands.is_closed()
    }

    /// Waits until the session has stopped.
    pub async fn stopped(&self) {
        let mut state = self.state.clone();
        // An error means the task was dropped with its runtime, which
        // also counts as stopped.
        let _ = state.wait_for(|s| *s == SessionState::Stopped).await;
    }
}

/// State owned by the running session task.
struct SessionTask {
    id: SessionId,
    handler: Arc<dyn MessageHandler>,
    parser: MessageParser,
    read_buf: Vec<u8>,
    inbox: Vec<NetworkMessage>,
    write_queue: VecDeque<Vec<u8>>,
    /// Bytes of the queue's front payload already on the wire.
    written: usize,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    state: watch::Sender<SessionState>,
}

impl SessionTask {
    async fn run(mut self, stream: TcpStream) {
        let (mut reader, mut writer) = stream.into_split();
        self.state.send_replace(SessionState::Running);
        tracing::debug!(session = %self.id, "session running");

        let outcome: Result<(), SessionError> = loop {
            let writing = !self.write_queue.is_empty();

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(SessionCommand::Write(payload)) => self.enqueue(payload),
                    Some(SessionCommand::Stop) | None => break Ok(()),
                },

                result = write_front(&mut writer, self.write_queue.front(), self.written), if writing => {
                    match result {
                        Ok(0) => {
                            break Err(TransportError::SendFailed(io::ErrorKind::WriteZero.into()).into());
                        }
                        Ok(n) => self.on_write(n),
                        Err(e) => break Err(TransportError::SendFailed(e).into()),
                    }
                }

                result = reader.read(&mut self.read_buf) => match result {
                    Ok(0) => {
                        break Err(TransportError::ConnectionClosed("peer closed the connection".into()).into());
                    }
                    Ok(n) => {
                        if let Err(e) = self.on_read(n) {
                            break Err(e);
                        }
                    }
                    Err(e) => break Err(TransportError::ReceiveFailed(e).into()),
                },
            }
        };

        drop(reader);
        drop(writer);

        match &outcome {
            Ok(()) => tracing::debug!(session = %self.id, "session stopped"),
            Err(e) if e.is_peer_closed() => {
                tracing::info!(session = %self.id, "peer disconnected");
            }
            Err(e) => tracing::warn!(session = %self.id, error = %e, "session failed"),
        }
        if !self.write_queue.is_empty() {
            tracing::debug!(
                session = %self.id,
                dropped = self.write_queue.len(),
                "discarding unsent writes"
            );
        }

        self.state.send_replace(SessionState::Stopped);
        self.handler.on_session_stopped(self.id, outcome.as_ref().err());
    }

    fn enqueue(&mut self, payload: Vec<u8>) {
        if payload.is_empty() {
            return;
        }
        self.write_queue.push_back(payload);
    }

    fn on_write(&mut self, n: usize) {
        self.written += n;
        let done = self
            .write_queue
            .front()
            .is_some_and(|front| self.written >= front.len());
        if done {
            self.write_queue.pop_front();
            self.written = 0;
        }
    }

    /// Parses `n` freshly read bytes. Messages completed before a framing
    /// error are still delivered.
    fn on_read(&mut self, n: usize) -> Result<(), SessionError> {
        let result = self
            .parser
            .extract_messages_into(&self.read_buf[..n], &mut self.inbox);

        if !self.inbox.is_empty() {
            let messages = std::mem::take(&mut self.inbox);
            tracing::trace!(session = %self.id, count = messages.len(), "messages received");
            self.handler.on_messages_received(self.id, messages);
        }

        result.map(|_| ()).map_err(SessionError::from)
    }
}

/// Writes as much of the front payload as the socket accepts.
///
/// Only polled while the queue is non-empty.
async fn write_front(
    writer: &mut OwnedWriteHalf,
    front: Option<&Vec<u8>>,
    offset: usize,
) -> io::Result<usize> {
    match front {
        Some(payload) => writer.write(&payload[offset..]).await,
        None => std::future::pending().await,
    }
}
