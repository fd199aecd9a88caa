//! Client-side connect loop.
//!
//! A game client usually starts before (or restarts while) the server is
//! down. [`connect`] keeps retrying while the server *refuses* the
//! connection, pacing attempts with a [`ReconnectPolicy`]. Any other
//! error ends the loop.

use std::io::ErrorKind;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;

use crate::TransportError;

/// How the connect loop paces retries after a refused connection.
///
/// The delay before retry `n` is `initial_delay * 2^(n-1)`, capped at
/// `max_delay`. With `jitter`, each delay is drawn uniformly from
/// `[delay / 2, delay]` so that many clients restarted together don't
/// retry in lockstep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Give up after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Randomize each delay.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            max_attempts: None,
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    /// Retry immediately and forever.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts: None,
            jitter: false,
        }
    }

    /// Retry forever at a fixed interval.
    pub fn polling(interval: Duration) -> Self {
        Self {
            initial_delay: interval,
            max_delay: interval,
            max_attempts: None,
            jitter: false,
        }
    }

    /// Caps the number of connection attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Normalizes the policy so it's safe to use.
    ///
    /// - `initial_delay` and `max_delay` are swapped if inverted.
    /// - `max_attempts` of zero is raised to one.
    pub fn validated(mut self) -> Self {
        if self.initial_delay > self.max_delay {
            tracing::warn!(
                initial = ?self.initial_delay,
                max = ?self.max_delay,
                "reconnect initial_delay exceeds max_delay, swapping"
            );
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        if self.max_attempts == Some(0) {
            self.max_attempts = Some(1);
        }
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let base = self
            .initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        if !self.jitter || base.is_zero() {
            return base;
        }
        let high = base.as_nanos().min(u64::MAX as u128) as u64;
        let nanos = rand::rng().random_range(high / 2..=high);
        Duration::from_nanos(nanos)
    }

    /// Returns `true` once `attempts` have used up the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Connects to `addr`, retrying refused connections per `policy`.
///
/// # Errors
/// Returns [`TransportError::ConnectFailed`] when the attempt budget runs
/// out, or immediately for any error other than `ConnectionRefused`.
pub async fn connect(
    addr: &str,
    policy: &ReconnectPolicy,
) -> Result<TcpStream, TransportError> {
    let policy = policy.clone().validated();
    let mut attempts = 0u32;

    tracing::info!(addr, "attempting to connect");
    loop {
        attempts += 1;
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(addr, error = %e, "failed to set TCP_NODELAY");
                }
                tracing::info!(addr, attempts, "connected");
                return Ok(stream);
            }
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                if policy.is_exhausted(attempts) {
                    tracing::warn!(addr, attempts, "giving up on connection");
                    return Err(TransportError::ConnectFailed {
                        attempts,
                        source: e,
                    });
                }
                let delay = policy.delay_for(attempts);
                tracing::debug!(
                    addr,
                    attempts,
                    delay_ms = delay.as_secs_f64() * 1000.0,
                    "connection refused, retrying"
                );
                if delay.is_zero() {
                    // Let other reactor tasks run between tight retries.
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => {
                tracing::error!(addr, attempts, error = %e, "connect failed");
                return Err(TransportError::ConnectFailed {
                    attempts,
                    source: e,
                });
            }
        }
    }
}
