//! Core protocol types for Hydra's wire format.
//!
//! Every message on the wire is a fixed-width [`MessageHeader`] followed
//! by exactly `message_length` payload bytes:
//!
//! ```text
//! +-------------------+---------------------+------------------------+
//! | message_type: u32 | message_length: u32 | payload (length bytes) |
//! +-------------------+---------------------+------------------------+
//!   little-endian       little-endian
//! ```
//!
//! Messages are packed back-to-back. The length prefix is the only
//! delimiter, which is why the parser has to count bytes so carefully.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Serialized width of a [`MessageHeader`] in bytes.
///
/// This is the fundamental framing unit: the parser always collects
/// exactly this many bytes before it knows how long a payload is.
pub const HEADER_SIZE: usize = 8;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The type tag carried in every header.
///
/// A newtype over `u32` rather than a closed enum: the set of message
/// kinds belongs to the application, and the framer must pass through
/// tags it has never heard of. The associated constants name the kinds
/// the game currently uses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageType(pub u32);

impl MessageType {
    /// No type. A freshly reset header carries this tag.
    pub const NONE: Self = Self(0);
    /// Creature state.
    pub const CREATURE: Self = Self(1);
    /// An attack action.
    pub const ATTACK: Self = Self(2);
    /// A movement action.
    pub const MOVE: Self = Self(3);
    /// Used by tests and diagnostics.
    pub const TEST_MESSAGE: Self = Self(4);

    /// Returns the human-readable name for known tags.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::NONE => Some("None"),
            Self::CREATURE => Some("Creature"),
            Self::ATTACK => Some("Attack"),
            Self::MOVE => Some("Move"),
            Self::TEST_MESSAGE => Some("TestMessage"),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Unknown({})", self.0),
        }
    }
}

// ---------------------------------------------------------------------------
// MessageHeader
// ---------------------------------------------------------------------------

/// Fixed-width header that precedes every payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct MessageHeader {
    /// What kind of message follows.
    pub message_type: MessageType,
    /// Number of payload bytes that follow the header.
    pub message_length: u32,
}

impl MessageHeader {
    /// Creates a header for a payload of `message_length` bytes.
    pub fn new(message_type: MessageType, message_length: u32) -> Self {
        Self {
            message_type,
            message_length,
        }
    }

    /// Serializes the header into its `HEADER_SIZE`-byte wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(&self.message_type.0.to_le_bytes());
        bytes[4..].copy_from_slice(&self.message_length.to_le_bytes());
        bytes
    }

    /// Reads a header back from its wire form.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let [t0, t1, t2, t3, l0, l1, l2, l3] = *bytes;
        Self {
            message_type: MessageType(u32::from_le_bytes([t0, t1, t2, t3])),
            message_length: u32::from_le_bytes([l0, l1, l2, l3]),
        }
    }
}

// ---------------------------------------------------------------------------
// NetworkMessage
// ---------------------------------------------------------------------------

/// A complete message: header plus payload.
///
/// The parser builds one of these incrementally (header first, payload
/// after) and hands ownership to the caller once both halves are in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkMessage {
    /// The header as read from (or written to) the wire.
    pub header: MessageHeader,
    /// Raw payload bytes. The framer never interprets them.
    pub payload: Vec<u8>,
}

impl NetworkMessage {
    /// Creates a message, computing the header length from the payload.
    ///
    /// # Errors
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload length
    /// doesn't fit in the header's `u32` length field.
    pub fn new(
        message_type: MessageType,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        let length = u32::try_from(payload.len())
            .map_err(|_| ProtocolError::PayloadTooLarge(payload.len()))?;
        Ok(Self {
            header: MessageHeader::new(message_type, length),
            payload,
        })
    }

    /// The message's type tag.
    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    /// Number of bytes this message occupies on the wire.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serializes header and payload into one contiguous frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.frame_len());
        self.encode_into(&mut frame);
        frame
    }

    /// Appends the framed message to `buf`.
    ///
    /// Useful for packing many messages back-to-back into one write.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.header.to_bytes());
        buf.extend_from_slice(&self.payload);
    }
}
