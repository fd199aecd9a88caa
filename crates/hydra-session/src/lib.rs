//! Session layer for Hydra.
//!
//! A session is one connected socket plus everything needed to turn it
//! into a stream of [`NetworkMessage`](hydra_protocol::NetworkMessage)s:
//!
//! - [`TcpSession`] / [`SessionHandle`]: the per-connection I/O pump
//! - [`MessageHandler`]: where a session's output goes
//! - [`EventQueue`] / [`SessionEvent`]: the hand-off to the owner thread
//! - [`SessionRegistry`]: the server's table of live sessions

mod config;
mod error;
mod events;
mod handler;
mod registry;
mod session;

pub use config::{SessionConfig, DEFAULT_READ_BUFFER_SIZE};
pub use error::SessionError;
pub use events::{event_queue, EventQueue, EventSender, SessionEvent};
pub use handler::MessageHandler;
pub use registry::SessionRegistry;
pub use session::{SessionHandle, SessionState, TcpSession};
