//! Session configuration.

use hydra_protocol::{DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_RESERVED_BYTES};
use serde::{Deserialize, Serialize};

/// Default size of the per-session socket read buffer (32 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 32 * 1024;

/// Configuration shared by every session a server or client creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bytes requested from the socket per read.
    pub read_buffer_size: usize,

    /// Largest payload a peer may announce. A bigger header stops the
    /// session with a framing error.
    pub max_payload_size: u32,

    /// Initial capacity of each of the parser's two buffers.
    pub parser_reserve: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            parser_reserve: DEFAULT_RESERVED_BYTES,
        }
    }
}

impl SessionConfig {
    /// Returns a copy with values clamped to usable ranges.
    ///
    /// A zero `read_buffer_size` would make every read look like EOF, so
    /// it is raised to the default.
    pub fn validated(mut self) -> Self {
        if self.read_buffer_size == 0 {
            tracing::warn!(
                default = DEFAULT_READ_BUFFER_SIZE,
                "read_buffer_size of 0 is invalid, using default"
            );
            self.read_buffer_size = DEFAULT_READ_BUFFER_SIZE;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = SessionConfig::default();
        assert_eq!(config.read_buffer_size, 32 * 1024);
        assert_eq!(config.max_payload_size, 16 * 1024 * 1024);
        assert_eq!(config.parser_reserve, 512);
    }

    #[test]
    fn test_validated_zero_read_buffer_uses_default() {
        let config = SessionConfig {
            read_buffer_size: 0,
            ..SessionConfig::default()
        }
        .validated();
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_validated_keeps_valid_values() {
        let config = SessionConfig {
            read_buffer_size: 7,
            max_payload_size: 0,
            parser_reserve: 0,
        };
        assert_eq!(config.clone().validated(), config);
    }
}
