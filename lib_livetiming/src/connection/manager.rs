//! # Connection Manager
//!
//! Owns at most one stream at a time and drives the status state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//!                     |             |
//!                     v             v (stream error)
//!                   Failed <- Reconnecting -> Connecting ...
//! ```
//!
//! ## Core Rules:
//!
//! - `connect()` is a no-op while a stream exists (open or opening).
//! - A synchronous open failure emits `InitError` and lands in `Failed`
//!   without scheduling a retry.
//! - A stream error emits `ConnectionError`, discards the stream and either
//!   schedules a retry (`Reconnecting`) or gives up (`Failed`, plus a single
//!   `MaxRetriesExceeded` when the budget is spent).
//! - Every open attempt carries a generation number; signals from a stream
//!   that has since been closed are ignored.
//! - A retry timer that fires after `disconnect()` opens nothing, even when it
//!   raced past its own cancellation check.
//! - The internal lock is never held while listeners run or while the
//!   transport opens or closes a stream.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use serde_json::{json, Value};

use super::emitter::{EventEmitter, EventName, StreamEvent};
use super::reconnection::{ReconnectionConfig, ReconnectionStrategy};
use super::transport::{StreamHandle, StreamSignals, StreamSink, Transport};
use super::types::{
    ConnectionOptions, ConnectionStats, ConnectionStatus, ErrorEventData, ErrorKind, StatusChange,
};
use crate::clock::now_millis;
use crate::loggers::Logger;
use crate::subscription::Unsubscribe;
use crate::sync::lock;

struct ActiveStream {
    generation: u64,
    /// `None` while the transport is still inside `open`.
    handle: Option<Box<dyn StreamHandle>>,
}

struct Link {
    status: ConnectionStatus,
    active: Option<ActiveStream>,
    generation: u64,
    destroyed: bool,
}

struct Shared {
    url: String,
    options: ConnectionOptions,
    logger: Arc<Logger>,
    emitter: EventEmitter,
    reconnection: ReconnectionStrategy,
    transport: Arc<dyn Transport>,
    link: Mutex<Link>,
    self_ref: Weak<Shared>,
}

/// Who asked for a stream to be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenTrigger {
    Manual,
    Retry,
}

impl Shared {
    fn connect(&self) {
        self.open(OpenTrigger::Manual);
    }

    /// Entry point of a fired retry timer. Does nothing once reconnection has
    /// been disabled, even if the timer already passed its own check.
    fn connect_retry(&self) {
        self.open(OpenTrigger::Retry);
    }

    fn open(&self, trigger: OpenTrigger) {
        let generation = {
            let mut link = lock(&self.link);
            if link.destroyed {
                self.logger.warn("Connection manager destroyed, connect ignored", None);
                return;
            }
            if trigger == OpenTrigger::Retry && !self.reconnection.is_reconnect_enabled() {
                self.logger.debug("Reconnection disabled, retry dropped", None);
                return;
            }
            if link.active.is_some() {
                self.logger.warn("Already connected or connecting", None);
                return;
            }
            link.generation += 1;
            let generation = link.generation;
            link.active = Some(ActiveStream {
                generation,
                handle: None,
            });
            generation
        };

        self.update_status_for(generation, ConnectionStatus::Connecting);

        let target: Weak<dyn StreamSignals> = self.self_ref.clone();
        let sink = StreamSink::new(target, generation);

        match self.transport.open(&self.url, sink) {
            Ok(handle) => {
                let orphan = {
                    let mut link = lock(&self.link);
                    match link.active.as_mut() {
                        Some(active) if active.generation == generation => {
                            active.handle = Some(handle);
                            None
                        }
                        _ => Some(handle),
                    }
                };
                match orphan {
                    // The stream failed or was closed while still opening.
                    Some(mut handle) => handle.close(),
                    None => self.logger.debug("Stream created", Some(&json!({ "generation": generation }))),
                }
            }
            Err(e) => {
                self.logger.error(
                    "Failed to create connection",
                    Some(&json!({ "error": e.to_string() })),
                );
                {
                    let mut link = lock(&self.link);
                    if link.active.as_ref().map(|a| a.generation) == Some(generation) {
                        link.active = None;
                    }
                }
                self.emitter.emit(&StreamEvent::Error(ErrorEventData::new(
                    ErrorKind::InitError,
                    e.to_string(),
                )));
                self.update_status(ConnectionStatus::Failed);
            }
        }
    }

    fn disconnect(&self) {
        self.logger.info("Manually disconnecting", None);
        self.reconnection.stop_reconnecting();
        self.cleanup();
        self.update_status(ConnectionStatus::Disconnected);
    }

    fn reconnect(&self) {
        if lock(&self.link).destroyed {
            self.logger.warn("Connection manager destroyed, reconnect ignored", None);
            return;
        }
        self.logger.info("Manual reconnect requested", None);
        self.disconnect();
        self.reconnection.enable_reconnecting();
        self.reconnection.reset();
        self.connect();
    }

    fn destroy(&self) {
        self.logger.info("Destroying instance", None);
        self.disconnect();
        lock(&self.link).destroyed = true;
        self.emitter.remove_all_listeners();
        self.reconnection.destroy();
        self.logger.info("Instance destroyed", None);
    }

    /// Detaches the current stream (if any) and closes it outside the lock.
    fn cleanup(&self) {
        let taken = lock(&self.link).active.take();
        if let Some(ActiveStream {
            handle: Some(mut handle),
            ..
        }) = taken
        {
            handle.close();
            self.logger.debug("Stream closed", None);
        }
    }

    fn update_status(&self, next: ConnectionStatus) {
        self.transition(None, next);
    }

    /// Moves to `next` only while the stream of `generation` is still the
    /// active one.
    fn update_status_for(&self, generation: u64, next: ConnectionStatus) {
        self.transition(Some(generation), next);
    }

    fn transition(&self, generation: Option<u64>, next: ConnectionStatus) {
        let previous = {
            let mut link = lock(&self.link);
            if let Some(generation) = generation {
                let current = link.active.as_ref().map(|active| active.generation);
                if link.destroyed || current != Some(generation) {
                    return;
                }
            }
            if link.status == next {
                return;
            }
            let previous = link.status;
            link.status = next;
            previous
        };

        self.logger
            .info(&format!("Status changed: {} -> {}", previous, next), None);
        self.emitter.emit(&StreamEvent::StatusChange(StatusChange {
            from: previous,
            to: next,
            timestamp: now_millis(),
        }));
    }

    fn handle_connection_error(&self, reason: &str) {
        self.logger
            .error("Connection error", Some(&json!({ "reason": reason })));

        let retry_count = self.reconnection.retry_count();
        self.emitter.emit(&StreamEvent::Error(
            ErrorEventData::new(ErrorKind::ConnectionError, reason)
                .with_retry(retry_count, Some(self.reconnection.can_reconnect())),
        ));
        self.cleanup();

        if self.reconnection.can_reconnect() {
            self.update_status(ConnectionStatus::Reconnecting);
            let weak = self.self_ref.clone();
            let scheduled = self.reconnection.schedule_reconnect(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.connect_retry();
                }
            });
            if !scheduled {
                self.update_status(ConnectionStatus::Failed);
            }
        } else if self.reconnection.is_max_retries_reached() {
            self.update_status(ConnectionStatus::Failed);
            self.emitter.emit(&StreamEvent::Error(
                ErrorEventData::new(ErrorKind::MaxRetriesExceeded, "Max retries exceeded")
                    .with_retry(self.reconnection.retry_count(), None),
            ));
        } else {
            self.update_status(ConnectionStatus::Failed);
        }
    }
}

impl StreamSignals for Shared {
    fn on_open(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        self.logger.info("Connection established", None);
        self.reconnection.reset();
        self.update_status_for(generation, ConnectionStatus::Connected);
    }

    fn on_event(&self, generation: u64, name: &str, data: &str) {
        if !self.is_current(generation) {
            return;
        }
        let Some(event) = EventName::from_wire(name) else {
            self.logger
                .debug(&format!("Ignoring unsupported event '{}'", name), None);
            return;
        };

        self.logger.debug(
            &format!("Received {} event", event),
            Some(&json!({ "dataLength": data.len() })),
        );

        match serde_json::from_str::<Value>(data) {
            Ok(value) => {
                let event = match event {
                    EventName::Initial => StreamEvent::Initial(value),
                    _ => StreamEvent::Update(value),
                };
                self.emitter.emit(&event);
            }
            Err(e) => {
                self.logger.error(
                    &format!("Failed to parse {} data", event),
                    Some(&json!({ "error": e.to_string() })),
                );
                self.emitter.emit(&StreamEvent::Error(
                    ErrorEventData::new(ErrorKind::ParseError, e.to_string())
                        .with_event(event, data),
                ));
            }
        }
    }

    fn on_failure(&self, generation: u64, reason: &str) {
        if !self.is_current(generation) {
            return;
        }
        self.handle_connection_error(reason);
    }

    fn is_current(&self, generation: u64) -> bool {
        let link = lock(&self.link);
        !link.destroyed
            && link
                .active
                .as_ref()
                .map(|active| active.generation == generation)
                .unwrap_or(false)
    }
}

/// # Connection Manager
///
/// Public face of the connection layer. Cloning is not supported; share it
/// behind an `Arc` if several owners need it.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Creates a manager for `url` that opens streams through `transport`.
    /// Nothing is opened until [`ConnectionManager::connect`].
    pub fn new(
        url: impl Into<String>,
        options: ConnectionOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let url = url.into();
        let logger = Arc::new(Logger::new("SSE Connection", options.debug));
        let reconnection =
            ReconnectionStrategy::new(ReconnectionConfig::from(&options), Arc::clone(&logger));
        let emitter = EventEmitter::new(Arc::clone(&logger));

        logger.info(
            "SSEConnectionManager initialized",
            Some(&json!({ "url": url, "options": options })),
        );

        let shared = Arc::new_cyclic(|self_ref| Shared {
            url,
            options,
            logger,
            emitter,
            reconnection,
            transport,
            link: Mutex::new(Link {
                status: ConnectionStatus::Disconnected,
                active: None,
                generation: 0,
                destroyed: false,
            }),
            self_ref: self_ref.clone(),
        });

        Self { shared }
    }

    /// Creates a manager backed by the HTTP [`super::SseTransport`].
    #[cfg(feature = "stream")]
    pub fn with_sse(
        url: impl Into<String>,
        options: ConnectionOptions,
    ) -> Result<Self, crate::error::TransportError> {
        let transport = super::sse_transport::SseTransport::new()?;
        Ok(Self::new(url, options, Arc::new(transport)))
    }

    pub fn connect(&self) {
        self.shared.connect();
    }

    /// Disables automatic reconnection, closes the stream and moves to
    /// `Disconnected`. Idempotent.
    pub fn disconnect(&self) {
        self.shared.disconnect();
    }

    /// Disconnects, re-enables reconnection with a fresh retry budget and
    /// connects again.
    pub fn reconnect(&self) {
        self.shared.reconnect();
    }

    /// Disconnects, drops every listener and tears down the retry timer.
    /// The manager refuses to connect afterwards.
    pub fn destroy(&self) {
        self.shared.destroy();
    }

    pub fn on_initial<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.shared.emitter.on_initial(listener)
    }

    pub fn on_update<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.shared.emitter.on_update(listener)
    }

    pub fn on_error<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&ErrorEventData) + Send + Sync + 'static,
    {
        self.shared.emitter.on_error(listener)
    }

    pub fn on_status_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&StatusChange) + Send + Sync + 'static,
    {
        self.shared.emitter.on_status_change(listener)
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.shared.emitter
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.shared.link).status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.shared.link).destroyed
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.shared.options
    }

    pub fn reconnection(&self) -> &ReconnectionStrategy {
        &self.shared.reconnection
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            status: self.status(),
            retry_count: self.shared.reconnection.retry_count(),
            should_reconnect: self.shared.reconnection.is_reconnect_enabled(),
            listeners: self.shared.emitter.listener_counts(),
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.shared.url)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct MockTransport {
        sinks: Mutex<Vec<StreamSink>>,
        closed: Arc<AtomicUsize>,
        refuse: AtomicBool,
    }

    struct MockHandle {
        closed: Arc<AtomicUsize>,
    }

    impl StreamHandle for MockHandle {
        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Transport for MockTransport {
        fn open(&self, _url: &str, sink: StreamSink) -> Result<Box<dyn StreamHandle>, TransportError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::Refused("mock refused".to_string()));
            }
            self.sinks.lock().unwrap().push(sink);
            Ok(Box::new(MockHandle {
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    impl MockTransport {
        fn opens(&self) -> usize {
            self.sinks.lock().unwrap().len()
        }

        fn last(&self) -> StreamSink {
            self.sinks.lock().unwrap().last().cloned().unwrap()
        }
    }

    fn manager(max_retries: u32) -> (ConnectionManager, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::default());
        let options = ConnectionOptions {
            max_retries,
            ..ConnectionOptions::default()
        };
        let manager = ConnectionManager::new("http://test/stream", options, transport.clone());
        (manager, transport)
    }

    fn record_errors(manager: &ConnectionManager) -> Arc<Mutex<Vec<ErrorEventData>>> {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let _ = manager.on_error(move |e| sink.lock().unwrap().push(e.clone()));
        errors
    }

    #[test]
    fn test_connect_and_open_transitions() {
        let (manager, transport) = manager(5);
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&statuses);
        let _ = manager.on_status_change(move |change| seen.lock().unwrap().push(change.to));

        manager.connect();
        assert_eq!(manager.status(), ConnectionStatus::Connecting);

        transport.last().opened();
        assert!(manager.is_connected());
        assert_eq!(
            *statuses.lock().unwrap(),
            vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
        );
    }

    #[test]
    fn test_second_connect_is_noop() {
        let (manager, transport) = manager(5);
        manager.connect();
        manager.connect();
        assert_eq!(transport.opens(), 1);
    }

    #[test]
    fn test_named_events_are_decoded() {
        let (manager, transport) = manager(5);
        let received = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&received);
        let _ = manager.on_initial(move |v| seen.lock().unwrap().push(("initial", v.clone())));
        let seen = Arc::clone(&received);
        let _ = manager.on_update(move |v| seen.lock().unwrap().push(("update", v.clone())));

        manager.connect();
        let sink = transport.last();
        sink.opened();
        sink.event("initial", r#"{"SessionInfo":{"Name":"Race"}}"#);
        sink.event("update", r#"{"LapCount":{"CurrentLap":3}}"#);
        sink.event("heartbeat", "{}");

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].0, "initial");
        assert_eq!(received[0].1["SessionInfo"]["Name"], "Race");
        assert_eq!(received[1].1["LapCount"]["CurrentLap"], 3);
    }

    #[test]
    fn test_parse_error_keeps_status() {
        let (manager, transport) = manager(5);
        let errors = record_errors(&manager);

        manager.connect();
        let sink = transport.last();
        sink.opened();
        sink.event("update", "{not json");

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::ParseError);
        assert_eq!(errors[0].event, Some(EventName::Update));
        assert_eq!(errors[0].raw_data.as_deref(), Some("{not json"));
        assert!(manager.is_connected());
    }

    #[test]
    fn test_open_failure_is_init_error_without_retry() {
        let (manager, transport) = manager(5);
        transport.refuse.store(true, Ordering::SeqCst);
        let errors = record_errors(&manager);

        manager.connect();

        assert_eq!(manager.status(), ConnectionStatus::Failed);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::InitError);
        assert!(!manager.reconnection().has_pending_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_schedules_retry() {
        let (manager, transport) = manager(5);
        let errors = record_errors(&manager);

        manager.connect();
        transport.last().failed("network down");

        assert_eq!(manager.status(), ConnectionStatus::Reconnecting);
        assert_eq!(transport.closed.load(Ordering::SeqCst), 1);
        {
            let errors = errors.lock().unwrap();
            assert_eq!(errors[0].kind, ErrorKind::ConnectionError);
            assert_eq!(errors[0].retry_count, Some(0));
            assert_eq!(errors[0].will_retry, Some(true));
        }

        sleep(Duration::from_millis(1001)).await;
        assert_eq!(transport.opens(), 2);
        assert_eq!(manager.status(), ConnectionStatus::Connecting);
        assert_eq!(manager.stats().retry_count, 1);

        transport.last().opened();
        assert_eq!(manager.stats().retry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_emits_max_retries_once() {
        let (manager, transport) = manager(2);
        let errors = record_errors(&manager);

        manager.connect();
        for _ in 0..2 {
            transport.last().failed("down");
            sleep(Duration::from_secs(31)).await;
        }
        transport.last().failed("down");

        assert_eq!(manager.status(), ConnectionStatus::Failed);
        let errors = errors.lock().unwrap();
        let exhausted: Vec<_> = errors
            .iter()
            .filter(|e| e.kind == ErrorKind::MaxRetriesExceeded)
            .collect();
        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].retry_count, Some(2));
        assert_eq!(errors.last().map(|e| e.kind), Some(ErrorKind::MaxRetriesExceeded));

        sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.opens(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_retry() {
        let (manager, transport) = manager(5);
        manager.connect();
        transport.last().failed("down");
        assert_eq!(manager.status(), ConnectionStatus::Reconnecting);

        manager.disconnect();
        sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.opens(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_firing_after_disconnect_opens_nothing() {
        let (manager, transport) = manager(5);
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&statuses);
        let _ = manager.on_status_change(move |change| seen.lock().unwrap().push(change.to));

        manager.connect();
        transport.last().failed("down");
        manager.disconnect();

        // A timer that already passed its check before the disconnect.
        manager.shared.connect_retry();

        assert_eq!(transport.opens(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        assert_eq!(statuses.lock().unwrap().last(), Some(&ConnectionStatus::Disconnected));

        // A manual connect is still honored.
        manager.connect();
        assert_eq!(transport.opens(), 2);
    }

    #[test]
    fn test_retry_while_enabled_opens_a_stream() {
        let (manager, transport) = manager(5);
        manager.connect();
        manager.disconnect();
        manager.reconnection().enable_reconnecting();

        manager.shared.connect_retry();
        assert_eq!(transport.opens(), 2);
        assert_eq!(manager.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn test_stale_sink_is_ignored() {
        let (manager, transport) = manager(5);
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        let _ = manager.on_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.connect();
        let old = transport.last();
        manager.disconnect();
        manager.reconnect();

        old.opened();
        old.event("update", "{}");
        old.failed("late");
        assert_eq!(received.load(Ordering::SeqCst), 0);
        assert!(!old.is_active());
        assert!(transport.last().is_active());
        assert_eq!(manager.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn test_failure_after_disconnect_is_silent_failed() {
        let (manager, transport) = manager(5);
        manager.connect();
        let sink = transport.last();
        // Disabled reconnection with budget left: the error resolves to Failed.
        manager.reconnection().stop_reconnecting();
        sink.failed("down");
        assert_eq!(manager.status(), ConnectionStatus::Failed);
    }

    #[test]
    fn test_destroy_is_terminal() {
        let (manager, transport) = manager(5);
        let _ = manager.on_update(|_| {});
        manager.connect();
        manager.destroy();

        assert!(manager.is_destroyed());
        assert_eq!(manager.stats().listeners.update, 0);
        manager.connect();
        manager.reconnect();
        assert_eq!(transport.opens(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }
}
