//! # Hydra
//!
//! Length-prefixed message framing over TCP for game clients and servers.
//!
//! Every message on the wire is an 8-byte header (type tag and payload
//! length, both little-endian `u32`) followed by the payload. Hydra turns
//! the byte stream back into whole messages no matter how the network
//! fragments it, and queues outgoing messages so that only one write is
//! ever in flight per socket.
//!
//! All socket work runs on a background reactor thread. The game loop
//! talks to it through [`GameServer`] / [`GameClient`] and drains
//! [`SessionEvent`](hydra_session::SessionEvent)s once per frame.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hydra::prelude::*;
//!
//! let mut server = GameServer::builder().bind("127.0.0.1:26000").build()?;
//! let mut client = GameClient::builder().server_addr("127.0.0.1:26000").start()?;
//!
//! let hello = NetworkMessage::new(MessageType::TEST_MESSAGE, b"hello".to_vec())?;
//! client.send_message(&hello)?;
//!
//! for event in server.events().drain() {
//!     if let SessionEvent::Messages { session, messages } = event {
//!         for message in &messages {
//!             server.send_message(session, message)?;
//!         }
//!     }
//! }
//! # client.stop();
//! # server.stop();
//! # Ok::<(), HydraError>(())
//! ```

mod client;
mod error;
pub mod logging;
mod server;

pub use client::{GameClient, GameClientBuilder, SERVER_SESSION_ID};
pub use error::HydraError;
pub use server::{GameServer, GameServerBuilder, DEFAULT_BIND_ADDR};

pub use hydra_protocol as protocol;
pub use hydra_session as session;
pub use hydra_transport as transport;

/// Everything needed to run a server or client.
pub mod prelude {
    pub use crate::logging::init_logging;
    pub use crate::{GameClient, GameClientBuilder, GameServer, GameServerBuilder, HydraError};

    pub use hydra_protocol::{Codec, JsonCodec, MessageHeader, MessageType, NetworkMessage};
    pub use hydra_session::{EventQueue, SessionConfig, SessionEvent};
    pub use hydra_transport::{ReconnectPolicy, SessionId};
}
