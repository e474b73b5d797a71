//! Tracing subscriber setup.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "TASKWARDEN_LOG";

/// Error returned when the global subscriber cannot be installed.
#[derive(Debug, Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct TelemetryError(String);

/// Resolves the filter: `TASKWARDEN_LOG` when set and valid, otherwise
/// `fallback`, otherwise `info`.
#[must_use]
pub fn resolve_filter(env_value: Option<&str>, fallback: &str) -> EnvFilter {
    env_value
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .or_else(|| EnvFilter::try_new(fallback).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError`] when a global subscriber is already set.
pub fn init_tracing(fallback_filter: &str) -> Result<(), TelemetryError> {
    let env_value = std::env::var(LOG_ENV).ok();
    let filter = resolve_filter(env_value.as_deref(), fallback_filter);
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .map_err(|err| TelemetryError(err.to_string()))
}
