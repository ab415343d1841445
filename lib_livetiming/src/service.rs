//! # Live Timing Service
//!
//! Composition of the three layers behind one lifecycle API:
//!
//! ```text
//! ConnectionManager --initial--> InitialHandler --> DataStore::set_initial_state
//!                   --update---> UpdateHandler  --> DataStore::apply_update
//! ```
//!
//! The caller owns the instance. There is no process-wide default service.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::{
    ConnectionManager, ConnectionOptions, ConnectionStats, ConnectionStatus, ErrorEventData,
    StatusChange, Transport,
};
use crate::error::ConfigError;
use crate::handlers::{
    Handler, InitialHandler, InitialHandlerOptions, UpdateHandler, UpdateHandlerOptions,
};
use crate::store::{DataStore, DataStoreOptions, F1State, StoreStats};
use crate::subscription::Unsubscribe;

const LOG_TARGET: &str = "livetiming::service";

/// Path of the realtime stream relative to the API base.
pub const LIVETIMING_API_PATH: &str = "/livetiming/api/realtime";

/// Stream endpoint used when none is configured.
pub const DEFAULT_URL: &str = "http://localhost:8080/livetiming/api/realtime";

/// Joins `base` and [`LIVETIMING_API_PATH`].
pub fn endpoint_for_base(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), LIVETIMING_API_PATH)
}

/// # Service Options
///
/// Everything needed to build a [`LiveTimingService`]. Every field has a
/// default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceOptions {
    pub url: String,
    pub connection: ConnectionOptions,
    pub store: DataStoreOptions,
    pub initial_handler: InitialHandlerOptions,
    pub update_handler: UpdateHandlerOptions,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connection: ConnectionOptions::default(),
            store: DataStoreOptions::default(),
            initial_handler: InitialHandlerOptions::default(),
            update_handler: UpdateHandlerOptions::default(),
        }
    }
}

impl ServiceOptions {
    /// Reads options from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Turns component diagnostics on or off everywhere.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.connection.debug = debug;
        self.store.debug = debug;
        self.initial_handler.debug = debug;
        self.update_handler.debug = debug;
        self
    }

    pub fn with_snapshots(mut self, enabled: bool) -> Self {
        self.store.enable_snapshot = enabled;
        self
    }
}

/// Combined statistics of the connection and the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub connection: ConnectionStats,
    pub data_store: StoreStats,
}

/// # Live Timing Service
pub struct LiveTimingService {
    connection: ConnectionManager,
    store: Arc<DataStore>,
    initial_handler: Arc<InitialHandler>,
    update_handler: Arc<UpdateHandler>,
    started: AtomicBool,
}

impl LiveTimingService {
    /// Builds and wires every layer. Nothing is opened until
    /// [`LiveTimingService::start`].
    pub fn new(options: ServiceOptions, transport: Arc<dyn Transport>) -> Self {
        let ServiceOptions {
            url,
            connection,
            store,
            initial_handler,
            update_handler,
        } = options;

        let store = Arc::new(DataStore::new(store));
        let connection = ConnectionManager::new(url, connection, transport);

        let initial_handler = {
            let store = Arc::clone(&store);
            Arc::new(
                InitialHandler::new(initial_handler)
                    .on_processed(move |processed| {
                        info!(target: LOG_TARGET, "Initial data processed");
                        match F1State::from_value(processed.data) {
                            Ok(state) => store.set_initial_state(state),
                            Err(other) => {
                                warn!(target: LOG_TARGET, "Initial data is not an object: {}", other)
                            }
                        }
                    })
                    .on_error(|e| {
                        error!(target: LOG_TARGET, "Initial data processing failed: {}", e);
                    }),
            )
        };

        let update_handler = {
            let store = Arc::clone(&store);
            Arc::new(
                UpdateHandler::new(update_handler)
                    .on_processed(move |processed| store.apply_update(&processed.data))
                    .on_error(|e| {
                        error!(target: LOG_TARGET, "Update data processing failed: {}", e);
                    }),
            )
        };

        Self::wire(&connection, &initial_handler, &update_handler);

        Self {
            connection,
            store,
            initial_handler,
            update_handler,
            started: AtomicBool::new(false),
        }
    }

    /// Builds a service streaming over HTTP.
    #[cfg(feature = "stream")]
    pub fn with_sse(options: ServiceOptions) -> Result<Self, crate::error::TransportError> {
        let transport = crate::connection::SseTransport::new()?;
        Ok(Self::new(options, Arc::new(transport)))
    }

    fn wire(
        connection: &ConnectionManager,
        initial_handler: &Arc<InitialHandler>,
        update_handler: &Arc<UpdateHandler>,
    ) {
        let handler = Arc::clone(initial_handler);
        // Listeners live until the connection is destroyed.
        let _ = connection.on_initial(move |raw: &Value| {
            info!(target: LOG_TARGET, "Received initial event");
            if let Err(e) = handler.handle(raw) {
                warn!(target: LOG_TARGET, "Initial event rejected: {}", e);
            }
        });

        let handler = Arc::clone(update_handler);
        let _ = connection.on_update(move |raw: &Value| {
            if let Err(e) = handler.handle(raw) {
                warn!(target: LOG_TARGET, "Update event rejected: {}", e);
            }
        });

        let _ = connection.on_error(|e: &ErrorEventData| {
            error!(target: LOG_TARGET, "SSE connection error: {:?} {}", e.kind, e.message);
        });

        let _ = connection.on_status_change(|change: &StatusChange| {
            info!(target: LOG_TARGET, "SSE connection status changed: {} -> {}", change.from, change.to);
        });
    }

    /// Opens the stream. Warns and does nothing when already started.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!(target: LOG_TARGET, "Service is already started");
            return;
        }
        info!(target: LOG_TARGET, "Starting live timing service");
        self.connection.connect();
    }

    /// Closes the stream. Warns and does nothing when not started.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            warn!(target: LOG_TARGET, "Service is not started");
            return;
        }
        info!(target: LOG_TARGET, "Stopping live timing service");
        self.connection.disconnect();
    }

    /// Drops the current stream and connects again with a fresh retry budget.
    pub fn reconnect(&self) {
        info!(target: LOG_TARGET, "Reconnecting live timing service");
        self.started.store(true, Ordering::SeqCst);
        self.connection.reconnect();
    }

    /// Stops and tears down every layer. The instance is unusable afterwards.
    pub fn destroy(&self) {
        info!(target: LOG_TARGET, "Shutting down live timing service");
        if self.started.swap(false, Ordering::SeqCst) {
            self.connection.disconnect();
        }
        self.connection.destroy();
        self.store.destroy();
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Full-state subscription, see [`DataStore::subscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn(Option<&F1State>) + Send + Sync + 'static,
    {
        self.store.subscribe(callback)
    }

    /// Selector subscription, see [`DataStore::subscribe_selector`].
    pub fn subscribe_selector<T, S, F>(&self, selector: S, callback: F) -> Unsubscribe
    where
        S: Fn(&F1State) -> T + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.store.subscribe_selector(selector, callback)
    }

    pub fn get_state(&self) -> Option<F1State> {
        self.store.get_state()
    }

    pub fn get_connection_status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Whether an initial snapshot has been applied.
    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    pub fn get_stats(&self) -> ServiceStats {
        ServiceStats {
            connection: self.connection.stats(),
            data_store: self.store.stats(),
        }
    }

    pub fn on_error<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&ErrorEventData) + Send + Sync + 'static,
    {
        self.connection.on_error(listener)
    }

    pub fn on_status_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&StatusChange) + Send + Sync + 'static,
    {
        self.connection.on_status_change(listener)
    }

    /// The store, for snapshots and direct queries.
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn initial_handler(&self) -> &InitialHandler {
        &self.initial_handler
    }

    pub fn update_handler(&self) -> &UpdateHandler {
        &self.update_handler
    }
}

impl fmt::Debug for LiveTimingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveTimingService")
            .field("url", &self.connection.url())
            .field("started", &self.is_started())
            .field("status", &self.connection.status())
            .field("initialized", &self.store.is_initialized())
            .finish()
    }
}

impl Drop for LiveTimingService {
    fn drop(&mut self) {
        if !self.connection.is_destroyed() {
            self.connection.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{StreamHandle, StreamSink};
    use crate::error::TransportError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestTransport {
        sinks: Mutex<Vec<StreamSink>>,
    }

    struct TestHandle;

    impl StreamHandle for TestHandle {
        fn close(&mut self) {}
    }

    impl Transport for TestTransport {
        fn open(&self, _url: &str, sink: StreamSink) -> Result<Box<dyn StreamHandle>, TransportError> {
            self.sinks.lock().unwrap().push(sink);
            Ok(Box::new(TestHandle))
        }
    }

    impl TestTransport {
        fn sink(&self) -> StreamSink {
            self.sinks.lock().unwrap().last().cloned().unwrap()
        }
    }

    fn service() -> (LiveTimingService, Arc<TestTransport>) {
        let transport = Arc::new(TestTransport::default());
        let service = LiveTimingService::new(ServiceOptions::default(), transport.clone());
        (service, transport)
    }

    #[test]
    fn test_default_options() {
        let options = ServiceOptions::default();
        assert_eq!(options.url, DEFAULT_URL);
        assert_eq!(options.connection.max_retries, 5);
        assert_eq!(options.store.max_snapshots, 10);
        assert!(!options.store.enable_snapshot);
        assert_eq!(endpoint_for_base("http://localhost:8080/"), DEFAULT_URL);
    }

    #[test]
    fn test_partial_options_json() {
        let options: ServiceOptions = serde_json::from_value(json!({
            "url": "http://timing.local/livetiming/api/realtime",
            "connection": {"maxRetries": 2},
            "store": {"enableSnapshot": true}
        }))
        .unwrap();
        assert_eq!(options.connection.max_retries, 2);
        assert_eq!(options.connection.initial_retry_delay_ms, 1000);
        assert!(options.store.enable_snapshot);
        assert!(options.update_handler.add_timestamp);

        let debug = options.with_debug(true);
        assert!(debug.connection.debug && debug.store.debug && debug.update_handler.debug);
    }

    #[test]
    fn test_events_flow_into_store() {
        let (service, transport) = service();
        service.start();
        let sink = transport.sink();
        sink.opened();
        assert!(service.is_connected());

        sink.event("initial", r#"{"TimingData":{"Lines":{"44":{"Position":"1","GapToLeader":""}}}}"#);
        assert!(service.is_initialized());

        sink.event("update", r#"{"TimingData":{"Lines":{"44":{"Position":"2"}}}}"#);
        let state = service.get_state().unwrap();
        let line = &state.get("TimingData").unwrap()["Lines"]["44"];
        assert_eq!(line["Position"], json!(2));
        assert_eq!(line["GapToLeader"], json!(""));
        assert_eq!(service.get_stats().data_store.update_count, 1);
    }

    #[test]
    fn test_start_stop_guards() {
        let (service, transport) = service();
        service.stop();
        assert!(!service.is_started());

        service.start();
        service.start();
        assert_eq!(transport.sinks.lock().unwrap().len(), 1);

        service.stop();
        assert_eq!(service.get_connection_status(), ConnectionStatus::Disconnected);
        assert!(!service.is_started());
    }

    #[test]
    fn test_destroy_tears_everything_down() {
        let (service, transport) = service();
        service.start();
        transport.sink().opened();
        let _sub = service.subscribe(|_| {});
        service.destroy();

        assert!(!service.is_started());
        assert!(service.connection().is_destroyed());
        assert!(service.store().is_destroyed());
        assert_eq!(service.store().subscriber_count(), 0);
    }

    #[test]
    fn test_from_file_errors() {
        let missing = ServiceOptions::from_file("/nonexistent/livetiming.json");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
