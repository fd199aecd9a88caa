//! Restartable stream parser that turns TCP bytes into messages.
//!
//! TCP has no message boundaries. A single read may deliver half a
//! header, exactly one message, a dozen messages, or a message plus the
//! first few bytes of the next one. [`MessageParser`] keeps its progress
//! between calls so that every byte is consumed exactly once, no matter
//! how the stream was chunked.
//!
//! # State machine
//!
//! ```text
//!   Header ──(8 bytes)──→ Content ──(length bytes)──→ Finalizing ──→ Header
//! ```
//!
//! `Finalizing` consumes no bytes. It moves the completed message into
//! the output and immediately returns to `Header`.

use crate::buffer::{DoubleBuffer, DEFAULT_RESERVED_BYTES};
use crate::{MessageHeader, NetworkMessage, ProtocolError, HEADER_SIZE};

/// Default upper bound on a single payload (16 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Which part of a message the parser is currently collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Collecting the fixed-width header.
    Header,
    /// Collecting `header.message_length` payload bytes.
    Content,
    /// Message complete, about to be emitted.
    Finalizing,
}

/// Incremental framer for a single byte stream.
///
/// One parser per connection. All state (current step, partial buffers,
/// counters) persists across calls to
/// [`extract_messages`](Self::extract_messages).
#[derive(Debug)]
pub struct MessageParser {
    state: ParseState,
    /// The message being assembled. Moved out on finalization.
    message: NetworkMessage,
    buffers: DoubleBuffer,
    /// Bytes collected for the current state. Resets on every transition.
    bytes_parsed_this_state: usize,
    max_payload_size: u32,
}

impl MessageParser {
    /// Creates a parser with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Creates a parser that rejects payloads above `max_payload_size`.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self::with_capacity_and_max_payload(
            DEFAULT_RESERVED_BYTES,
            max_payload_size,
        )
    }

    /// Creates a parser with custom buffer reservation and payload limit.
    pub fn with_capacity_and_max_payload(
        reserve: usize,
        max_payload_size: u32,
    ) -> Self {
        Self {
            state: ParseState::Header,
            message: NetworkMessage::default(),
            buffers: DoubleBuffer::with_capacity(reserve),
            bytes_parsed_this_state: 0,
            max_payload_size,
        }
    }

    /// Extracts every message completed by `stream`.
    ///
    /// Convenience wrapper over
    /// [`extract_messages_into`](Self::extract_messages_into). On error,
    /// messages completed earlier in the same call are dropped; use the
    /// `_into` form when they must still be delivered.
    ///
    /// # Errors
    /// Returns [`ProtocolError::FrameTooLarge`] if a header announces a
    /// payload above the configured maximum.
    pub fn extract_messages(
        &mut self,
        stream: &[u8],
    ) -> Result<Vec<NetworkMessage>, ProtocolError> {
        let mut messages = Vec::new();
        self.extract_messages_into(stream, &mut messages)?;
        Ok(messages)
    }

    /// Feeds `stream` to the parser, appending completed messages to
    /// `messages` in stream order. Returns how many were appended.
    ///
    /// `stream` may be any length, including zero, and need not line up
    /// with message boundaries. Partial header or payload bytes are kept
    /// for the next call.
    ///
    /// # Errors
    /// Returns [`ProtocolError::FrameTooLarge`] if a header announces a
    /// payload above the configured maximum. Messages completed before
    /// the oversized header are already in `messages`. The parser must
    /// be [`reset`](Self::reset) (or dropped) afterwards.
    pub fn extract_messages_into(
        &mut self,
        stream: &[u8],
        messages: &mut Vec<NetworkMessage>,
    ) -> Result<usize, ProtocolError> {
        let before = messages.len();
        let mut cursor = 0;

        while cursor < stream.len() {
            let target = self.target_size();
            let needed = target - self.bytes_parsed_this_state;
            let remaining = stream.len() - cursor;

            // Never copy past the end of the current state. Bytes after
            // that belong to the next header or the next message.
            let take = remaining.min(needed);
            self.buffers.append(&stream[cursor..cursor + take]);
            self.bytes_parsed_this_state += take;
            cursor += take;

            if self.bytes_parsed_this_state == target {
                self.complete_state(messages)?;
            }
        }

        Ok(messages.len() - before)
    }

    /// Discards any partially parsed message and starts over at `Header`.
    pub fn reset(&mut self) {
        self.state = ParseState::Header;
        self.message = NetworkMessage::default();
        self.buffers.reset();
        self.bytes_parsed_this_state = 0;
    }

    /// The state the next byte will be parsed in.
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Bytes collected so far for the current state.
    pub fn bytes_parsed_this_state(&self) -> usize {
        self.bytes_parsed_this_state
    }

    /// The configured payload limit.
    pub fn max_payload_size(&self) -> u32 {
        self.max_payload_size
    }

    fn target_size(&self) -> usize {
        match self.state {
            ParseState::Header => HEADER_SIZE,
            ParseState::Content => self.message.header.message_length as usize,
            ParseState::Finalizing => 0,
        }
    }

    /// Handles the transition out of a state whose bytes are all in.
    fn complete_state(
        &mut self,
        messages: &mut Vec<NetworkMessage>,
    ) -> Result<(), ProtocolError> {
        match self.state {
            ParseState::Header => {
                let bytes: &[u8; HEADER_SIZE] =
                    self.buffers.active().try_into().map_err(|_| {
                        ProtocolError::InvalidMessage(format!(
                            "header buffer holds {} bytes",
                            self.buffers.len()
                        ))
                    })?;
                let header = MessageHeader::from_bytes(bytes);

                if header.message_length > self.max_payload_size {
                    tracing::warn!(
                        message_type = %header.message_type,
                        length = header.message_length,
                        max = self.max_payload_size,
                        "rejecting oversized frame"
                    );
                    return Err(ProtocolError::FrameTooLarge {
                        length: header.message_length,
                        max: self.max_payload_size,
                    });
                }

                self.message.header = header;
                self.advance(ParseState::Content);

                // An empty payload is already complete.
                if header.message_length == 0 {
                    self.complete_state(messages)?;
                }
            }
            ParseState::Content => {
                // Small payloads are copied so the working buffer keeps its
                // allocation. Larger ones take the buffer itself.
                if self.buffers.len() > self.buffers.reserved() {
                    self.message.payload = self.buffers.take_active();
                } else {
                    self.message.payload.extend_from_slice(self.buffers.active());
                }
                self.advance(ParseState::Finalizing);
                self.complete_state(messages)?;
            }
            ParseState::Finalizing => {
                messages.push(std::mem::take(&mut self.message));
                self.state = ParseState::Header;
            }
        }
        Ok(())
    }

    fn advance(&mut self, next: ParseState) {
        self.buffers.swap();
        self.bytes_parsed_this_state = 0;
        self.state = next;
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}
