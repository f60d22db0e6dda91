//! Tracing subscriber setup for binaries embedding Warden.

use tracing_subscriber::EnvFilter;
use warden_core::{LogConfig, LogFormat};

use crate::error::ReportError;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `config.level` when set. Fails instead of panicking if
/// a subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), ReportError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            ReportError::Telemetry(format!("invalid log level '{}': {}", config.level, e))
        })?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| ReportError::Telemetry(e.to_string()))
}
