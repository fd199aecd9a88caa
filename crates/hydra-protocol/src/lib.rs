//! Wire protocol for Hydra.
//!
//! This crate turns an unstructured byte stream into discrete messages
//! and back:
//!
//! - **Types** ([`MessageType`], [`MessageHeader`], [`NetworkMessage`]):
//!   the length-prefixed frames that travel on the wire.
//! - **Parser** ([`MessageParser`]): a restartable state machine that
//!   reassembles frames from arbitrarily chunked reads.
//! - **Buffers** ([`DoubleBuffer`]): the two reusable buffers the parser
//!   alternates between.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): optional helpers for
//!   typed payloads.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets or threads. It is fed
//! byte slices by the session layer and hands back messages.
//!
//! ```text
//! Transport (socket) → Protocol (NetworkMessage) → Session (per-connection pump)
//! ```

mod buffer;
mod codec;
mod error;
mod parser;
mod types;

pub use buffer::{DoubleBuffer, DEFAULT_RESERVED_BYTES};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use parser::{MessageParser, ParseState, DEFAULT_MAX_PAYLOAD_SIZE};
pub use types::{MessageHeader, MessageType, NetworkMessage, HEADER_SIZE};
