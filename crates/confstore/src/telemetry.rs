//! Tracing subscriber setup for processes embedding the service.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

/// Level used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_level`.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install tracing subscriber: {}", e)))
}
