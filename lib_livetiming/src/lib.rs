//! # lib_livetiming
//!
//! Real-time state synchronization for a live timing feed. A long-lived
//! `text/event-stream` connection delivers one full `initial` snapshot followed
//! by a stream of partial `update` deltas; this crate turns that feed into a
//! single consistent state tree that many observers can subscribe to.
//!
//! ## Layers:
//!
//! - **`connection`**: the resilient connection layer. Owns the stream, decodes
//!   named events, reports status transitions and retries with exponential backoff.
//! - **`handlers`**: validation and normalization of raw payloads before they
//!   reach the store.
//! - **`store`**: the reactive state container, deep merge engine and the
//!   index-aware reconciliation of ordered sub-collections.
//! - **`service`**: wires the layers together behind one lifecycle API.
//!
//! Supporting modules: `loggers` (debug-gated diagnostics), `models` (typed
//! read views over state sections), `subscription` and `error`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

mod clock;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod loggers;
pub mod models;
pub mod service;
pub mod store;
pub mod subscription;
mod sync;

// --- Public API Re-exports ---
pub use connection::{
    ConnectionManager, ConnectionOptions, ConnectionStats, ConnectionStatus, ErrorEventData,
    ErrorKind, EventEmitter, EventName, ReconnectionStrategy, StatusChange, StreamEvent,
    StreamHandle, StreamSink, Transport,
};
pub use error::{ConfigError, TransportError};
pub use handlers::{
    Handler, HandlerError, HandlerErrorKind, InitialHandler, InitialHandlerOptions, UpdateHandler,
    UpdateHandlerOptions, ValidationResult,
};
pub use loggers::Logger;
pub use service::{LiveTimingService, ServiceOptions, ServiceStats};
pub use store::{DataStore, DataStoreOptions, F1State, Section, Snapshot, StoreStats};
pub use subscription::Unsubscribe;

#[cfg(feature = "stream")]
pub use connection::SseTransport;
