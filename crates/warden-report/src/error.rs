//! Error types for the report crate.

use thiserror::Error;

/// Errors that can occur while reporting a run.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Writing to the output sink failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A finding could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `new_writer` was asked for a format it does not know.
    #[error("unsupported output format '{0}' (supported: json, jsonl)")]
    UnsupportedFormat(String),

    /// The tracing subscriber could not be installed.
    #[error("failed to initialize tracing: {0}")]
    Telemetry(String),
}
