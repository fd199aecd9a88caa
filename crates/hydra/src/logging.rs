//! Logging setup for binaries built on Hydra.
//!
//! The library only emits `tracing` events. Nothing is printed until the
//! application installs a subscriber, either its own or the one from
//! [`init_logging`].

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Installs a global `fmt` subscriber that logs at `level` and above.
///
/// `RUST_LOG` directives, when set, take precedence. Returns `false` if a
/// global subscriber was already installed.
pub fn init_logging(level: Level) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(true)
        .try_init()
        .is_ok()
}
