//! Logging initialization.
//!
//! Installs a tracing-subscriber fmt layer filtered by `RUST_LOG` (falling
//! back to the configured level). Call once at binary startup; the library
//! itself only ever emits through `tracing` macros.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. Safe to call exactly once;
/// a second call returns an error from the subscriber registry, which
/// callers can ignore in tests.
pub fn init(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
