//! Error types shared across the crate.
//!
//! Handler failures have their own type in [`crate::handlers::HandlerError`];
//! connection failures are never returned as `Err` and travel through the
//! emitter as [`crate::connection::ErrorEventData`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to open a stream. Surfaces as an `InitError` event.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid stream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("No async runtime available to drive the stream")]
    NoRuntime,

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Transport refused to open: {0}")]
    Refused(String),
}

/// Failure to load [`crate::service::ServiceOptions`] from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
