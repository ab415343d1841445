//! # Loggers Module
//!
//! Diagnostic output for the engine. Every component owns a [`Logger`] built
//! from its `debug` option; when disabled the component stays silent, when
//! enabled its lines are forwarded to the `log` facade so the host process
//! decides where they end up (the client binary installs a `fern` dispatcher).

/// Enable-gated, prefixed logger forwarding to the `log` facade.
pub mod logger;

pub use logger::Logger;
