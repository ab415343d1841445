//! # Transport Seam
//!
//! The `ConnectionManager` never touches the network directly. It asks a
//! [`Transport`] to open a stream and hands it a [`StreamSink`]; the transport
//! reports back through the sink (`opened`, `event`, `failed`) from whatever
//! task drives the underlying connection, and returns a [`StreamHandle`] the
//! manager uses to close it.
//!
//! Each sink is bound to one open attempt. Once the manager closes or replaces
//! that stream, signals from the old sink are ignored.

use std::fmt;
use std::sync::Weak;

use crate::error::TransportError;

/// Opens streaming connections.
pub trait Transport: Send + Sync {
    /// Starts opening `url`. Returning `Err` means the stream could not even
    /// be created (an `InitError`); later failures go through `sink.failed`.
    fn open(&self, url: &str, sink: StreamSink) -> Result<Box<dyn StreamHandle>, TransportError>;
}

/// Owning handle to one open stream.
pub trait StreamHandle: Send {
    /// Tears the stream down. Must be idempotent and must not call back into
    /// the sink.
    fn close(&mut self);
}

/// Receiver side of a sink, implemented by the connection manager.
pub(crate) trait StreamSignals: Send + Sync {
    fn on_open(&self, generation: u64);
    fn on_event(&self, generation: u64, name: &str, data: &str);
    fn on_failure(&self, generation: u64, reason: &str);
    fn is_current(&self, generation: u64) -> bool;
}

/// # Stream Sink
///
/// Callback channel from a transport back to the manager that opened it.
/// Cloneable and `Send`, so a transport can move it into a spawned task.
#[derive(Clone)]
pub struct StreamSink {
    target: Weak<dyn StreamSignals>,
    generation: u64,
}

impl StreamSink {
    pub(crate) fn new(target: Weak<dyn StreamSignals>, generation: u64) -> Self {
        Self { target, generation }
    }

    /// The stream is open and ready to deliver events.
    pub fn opened(&self) {
        if let Some(target) = self.target.upgrade() {
            target.on_open(self.generation);
        }
    }

    /// A complete server-sent event arrived.
    pub fn event(&self, name: &str, data: &str) {
        if let Some(target) = self.target.upgrade() {
            target.on_event(self.generation, name, data);
        }
    }

    /// The stream failed or the server closed it.
    pub fn failed(&self, reason: &str) {
        if let Some(target) = self.target.upgrade() {
            target.on_failure(self.generation, reason);
        }
    }

    /// Whether the manager still considers this stream live. Transports can
    /// use this to stop reading early.
    pub fn is_active(&self) -> bool {
        self.target
            .upgrade()
            .map(|target| target.is_current(self.generation))
            .unwrap_or(false)
    }

    /// The open attempt this sink belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink")
            .field("generation", &self.generation)
            .field("attached", &(self.target.strong_count() > 0))
            .finish()
    }
}
