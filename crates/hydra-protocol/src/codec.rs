//! Payload codecs: typed values in and out of [`NetworkMessage`] payloads.
//!
//! The framer treats payloads as opaque bytes. What those bytes *mean*
//! belongs to the application, which picks a [`Codec`] to turn its own
//! types into payloads and back. [`JsonCodec`] is provided for
//! development and tests; a binary codec can be dropped in without
//! touching the framing code.

use serde::{de::DeserializeOwned, Serialize};

use crate::{MessageType, NetworkMessage, ProtocolError};

/// Encodes Rust values to payload bytes and decodes them back.
///
/// `Send + Sync + 'static` because a codec is shared by the reactor
/// thread and the owner thread for the lifetime of a server or client.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into payload bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes payload bytes into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ProtocolError>;

    /// Encodes `value` and wraps it in a message tagged `message_type`.
    ///
    /// # Errors
    /// Fails if encoding fails or the payload is too large for a frame.
    fn package<T: Serialize>(
        &self,
        message_type: MessageType,
        value: &T,
    ) -> Result<NetworkMessage, ProtocolError> {
        NetworkMessage::new(message_type, self.encode(value)?)
    }

    /// Decodes a received message's payload.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the payload doesn't decode as `T`.
    fn unpack<T: DeserializeOwned>(
        &self,
        message: &NetworkMessage,
    ) -> Result<T, ProtocolError> {
        self.decode(&message.payload)
    }
}

/// JSON codec backed by `serde_json`.
///
/// Human-readable, which makes captured traffic easy to inspect.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
    }
}
