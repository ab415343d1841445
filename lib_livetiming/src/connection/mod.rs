//! # Connection Module
//!
//! The resilient streaming layer. It owns the single long-lived
//! `text/event-stream` connection and turns its raw traffic into typed events.
//!
//! ## Core Components:
//!
//! - **`manager`**: the `ConnectionManager` state machine. Opens the stream,
//!   decodes `initial`/`update` payloads, reports errors and status
//!   transitions, and drives reconnection.
//! - **`emitter`**: the typed, panic-isolated pub/sub used for all four event
//!   channels.
//! - **`reconnection`**: exponential backoff bookkeeping and the single
//!   cancellable retry timer.
//! - **`transport`**: the seam between the manager and the network, so the
//!   engine can be driven by the HTTP transport or by a scripted one in tests.
//! - **`sse_decoder`** / **`sse_transport`**: the wire framing and the
//!   reqwest-backed transport (feature `stream`).

/// Typed pub/sub with per-listener fault isolation.
pub mod emitter;
/// The connection state machine.
pub mod manager;
/// Exponential backoff and the pending retry timer.
pub mod reconnection;
/// Incremental `text/event-stream` framing.
pub mod sse_decoder;
/// reqwest-backed transport.
#[cfg(feature = "stream")]
pub mod sse_transport;
/// Transport seam: `Transport`, `StreamHandle`, `StreamSink`.
pub mod transport;
/// Status, error and option types.
pub mod types;

// --- Public API Re-exports ---
pub use emitter::{EventEmitter, EventName, ListenerCounts, StreamEvent};
pub use manager::ConnectionManager;
pub use reconnection::{ReconnectionConfig, ReconnectionStrategy};
pub use sse_decoder::{SseDecoder, SseEvent};
#[cfg(feature = "stream")]
pub use sse_transport::SseTransport;
pub use transport::{StreamHandle, StreamSink, Transport};
pub use types::{
    ConnectionOptions, ConnectionStats, ConnectionStatus, ErrorEventData, ErrorKind, StatusChange,
};
