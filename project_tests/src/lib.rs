//! # Shared Test Doubles
//!
//! `ScriptedTransport` stands in for the HTTP transport. It records the
//! sink of every open attempt so a test can play the server side:
//! open the stream, push named events, or fail it.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use lib_livetiming::{
    ConnectionStatus, LiveTimingService, ServiceOptions, StreamHandle, StreamSink, Transport,
    TransportError,
};
use serde_json::Value;

/// Transport driven by the test instead of the network.
#[derive(Default)]
pub struct ScriptedTransport {
    sinks: Mutex<Vec<StreamSink>>,
    urls: Mutex<Vec<String>>,
    closed: Arc<AtomicUsize>,
    refuse: AtomicBool,
}

struct ScriptedHandle {
    closed: Arc<AtomicUsize>,
    done: bool,
}

impl StreamHandle for ScriptedHandle {
    fn close(&mut self) {
        if !self.done {
            self.done = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, url: &str, sink: StreamSink) -> Result<Box<dyn StreamHandle>, TransportError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Refused(format!("scripted refusal for {}", url)));
        }
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).push(url.to_string());
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner).push(sink);
        Ok(Box::new(ScriptedHandle {
            closed: Arc::clone(&self.closed),
            done: false,
        }))
    }
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every following open attempt fail immediately.
    pub fn refuse_opens(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of successful open attempts so far.
    pub fn opens(&self) -> usize {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of handles closed by the manager.
    pub fn closes(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Sink of the most recent open attempt.
    pub fn current(&self) -> Option<StreamSink> {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    fn with_current(&self, f: impl FnOnce(&StreamSink)) {
        match self.current() {
            Some(sink) => f(&sink),
            None => log::warn!("No stream has been opened yet"),
        }
    }

    pub fn open_stream(&self) {
        self.with_current(|sink| sink.opened());
    }

    pub fn send(&self, name: &str, data: &Value) {
        let text = data.to_string();
        self.with_current(|sink| sink.event(name, &text));
    }

    pub fn send_raw(&self, name: &str, data: &str) {
        self.with_current(|sink| sink.event(name, data));
    }

    pub fn send_initial(&self, data: &Value) {
        self.send("initial", data);
    }

    pub fn send_update(&self, data: &Value) {
        self.send("update", data);
    }

    pub fn fail_stream(&self, reason: &str) {
        self.with_current(|sink| sink.failed(reason));
    }
}

/// Service over a fresh scripted transport.
pub fn scripted_service(options: ServiceOptions) -> (LiveTimingService, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new();
    let service = LiveTimingService::new(options, transport.clone());
    (service, transport)
}

/// Starts `service` and completes the open handshake.
pub fn start_connected(service: &LiveTimingService, transport: &ScriptedTransport) {
    service.start();
    transport.open_stream();
    debug_assert_eq!(service.get_connection_status(), ConnectionStatus::Connected);
}

/// Records every value passed to it.
#[derive(Clone)]
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, value: T) {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).push(value);
    }

    pub fn values(&self) -> Vec<T> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
