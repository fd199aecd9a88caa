//! Two reusable byte buffers that alternate roles.
//!
//! The parser appends into the *active* buffer until a header or a
//! payload is complete. It reads the finished bytes out, then calls
//! [`DoubleBuffer::swap`]: the consumed buffer is cleared (keeping its
//! allocation) and the other buffer becomes active. Neither buffer is
//! ever reallocated for a typical small message.
//!
//! A payload that outgrew the reserved capacity is handed over whole with
//! [`DoubleBuffer::take_active`], so one large message does not pin its
//! allocation for the rest of the connection.

use std::mem;

/// Default capacity reserved on both buffers.
pub const DEFAULT_RESERVED_BYTES: usize = 512;

/// A pair of byte buffers, one active and one resting.
#[derive(Debug)]
pub struct DoubleBuffer {
    buffers: [Vec<u8>; 2],
    /// Index of the buffer currently being written to.
    active: usize,
    reserved: usize,
}

impl DoubleBuffer {
    /// Creates a double buffer with [`DEFAULT_RESERVED_BYTES`] on each side.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RESERVED_BYTES)
    }

    /// Creates a double buffer reserving `capacity` bytes on each side.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffers: [Vec::with_capacity(capacity), Vec::with_capacity(capacity)],
            active: 0,
            reserved: capacity,
        }
    }

    /// The bytes accumulated in the active buffer so far.
    pub fn active(&self) -> &[u8] {
        &self.buffers[self.active]
    }

    /// Appends bytes to the active buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.buffers[self.active].extend_from_slice(data);
    }

    /// Moves the active buffer's bytes out, leaving a fresh buffer with
    /// the reserved capacity in its place. The active side does not flip.
    pub fn take_active(&mut self) -> Vec<u8> {
        mem::replace(
            &mut self.buffers[self.active],
            Vec::with_capacity(self.reserved),
        )
    }

    /// Clears the active buffer and makes the other one active.
    pub fn swap(&mut self) {
        self.buffers[self.active].clear();
        self.active ^= 1;
    }

    /// Clears both buffers and makes the first one active again.
    pub fn reset(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
        self.active = 0;
    }

    /// Number of bytes in the active buffer.
    pub fn len(&self) -> usize {
        self.buffers[self.active].len()
    }

    /// Returns `true` if the active buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.buffers[self.active].is_empty()
    }

    /// Capacity of the smaller of the two buffers.
    pub fn capacity(&self) -> usize {
        self.buffers[0].capacity().min(self.buffers[1].capacity())
    }

    /// Capacity each buffer was created with.
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    /// Total bytes allocated across both buffers.
    pub fn retained_capacity(&self) -> usize {
        self.buffers.iter().map(Vec::capacity).sum()
    }
}

impl Default for DoubleBuffer {
    fn default() -> Self {
        Self::new()
    }
}
