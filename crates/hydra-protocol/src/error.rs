//! Error types for the protocol layer.
//!
//! Each crate in Hydra defines its own error enum. A `ProtocolError`
//! always means the problem is in framing or payload encoding, never in
//! the socket underneath.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a payload value failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserializing a payload value failed.
    ///
    /// Common causes: malformed JSON, missing required fields, or a
    /// message whose type tag doesn't match the payload inside it.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A peer announced a payload larger than the configured maximum.
    ///
    /// This is the only framing error peer bytes can trigger. The length
    /// comes straight from peer-controlled header bytes, so it is checked
    /// before a single payload byte is buffered.
    #[error("frame of {length} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Payload length announced by the header.
        length: u32,
        /// Configured maximum payload length.
        max: u32,
    },

    /// An outgoing payload can't be described by the `u32` length field.
    #[error("payload of {0} bytes does not fit in a frame")]
    PayloadTooLarge(usize),

    /// The framer's own bookkeeping disagreed with itself, for example a
    /// completed header buffer that doesn't hold exactly one header.
    /// Peer input alone can't produce this.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
