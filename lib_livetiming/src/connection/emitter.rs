//! # Typed Event Emitter
//!
//! A synchronous pub/sub primitive scoped to the four channels a connection
//! produces: `initial`, `update`, `error` and `statusChange`.
//!
//! ## Delivery Rules:
//!
//! 1.  **Synchronous**: `emit` returns only after every listener registered at
//!     the moment of the call has run.
//! 2.  **Snapshot iteration**: the listener list is copied before delivery, so a
//!     listener may subscribe or unsubscribe (itself or others) without
//!     deadlocking; the change takes effect on the next emit.
//! 3.  **Fault boundary**: each listener runs inside `catch_unwind`. A panicking
//!     listener is logged and the remaining listeners still receive the event.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::types::{ErrorEventData, StatusChange};
use crate::loggers::Logger;
use crate::subscription::Unsubscribe;
use crate::sync::lock;

/// The four channels an emitter carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventName {
    /// Full state snapshot from the server.
    Initial,
    /// Partial state delta from the server.
    Update,
    /// Any connection-level failure.
    Error,
    /// A connection status transition.
    StatusChange,
}

impl EventName {
    /// Channel name as used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Initial => "initial",
            EventName::Update => "update",
            EventName::Error => "error",
            EventName::StatusChange => "statusChange",
        }
    }

    /// Maps a server-sent event name to a data channel. Only `initial` and
    /// `update` are carried by the stream itself.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "initial" => Some(EventName::Initial),
            "update" => Some(EventName::Update),
            _ => None,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Decoded `initial` payload.
    Initial(Value),
    /// Decoded `update` payload.
    Update(Value),
    /// Error report.
    Error(ErrorEventData),
    /// Status transition.
    StatusChange(StatusChange),
}

impl StreamEvent {
    /// The channel this event is delivered on.
    pub fn name(&self) -> EventName {
        match self {
            StreamEvent::Initial(_) => EventName::Initial,
            StreamEvent::Update(_) => EventName::Update,
            StreamEvent::Error(_) => EventName::Error,
            StreamEvent::StatusChange(_) => EventName::StatusChange,
        }
    }
}

/// Number of listeners registered per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerCounts {
    /// Listeners on `initial`.
    pub initial: usize,
    /// Listeners on `update`.
    pub update: usize,
    /// Listeners on `error`.
    pub error: usize,
    /// Listeners on `statusChange`.
    pub status_change: usize,
}

type DataListener = Arc<dyn Fn(&Value) + Send + Sync>;
type ErrorListener = Arc<dyn Fn(&ErrorEventData) + Send + Sync>;
type StatusListener = Arc<dyn Fn(&StatusChange) + Send + Sync>;

/// Listener storage. Every registration gets a unique id so the matching
/// `Unsubscribe` removes exactly that entry, even when the same closure logic
/// is registered twice.
#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    initial: Vec<(u64, DataListener)>,
    update: Vec<(u64, DataListener)>,
    error: Vec<(u64, ErrorListener)>,
    status_change: Vec<(u64, StatusListener)>,
}

impl ListenerTable {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, event: EventName, id: u64) -> bool {
        fn drop_id<L: ?Sized>(list: &mut Vec<(u64, Arc<L>)>, id: u64) -> bool {
            let before = list.len();
            list.retain(|(entry_id, _)| *entry_id != id);
            list.len() != before
        }
        match event {
            EventName::Initial => drop_id(&mut self.initial, id),
            EventName::Update => drop_id(&mut self.update, id),
            EventName::Error => drop_id(&mut self.error, id),
            EventName::StatusChange => drop_id(&mut self.status_change, id),
        }
    }

    fn clear(&mut self, event: EventName) {
        match event {
            EventName::Initial => self.initial.clear(),
            EventName::Update => self.update.clear(),
            EventName::Error => self.error.clear(),
            EventName::StatusChange => self.status_change.clear(),
        }
    }

    fn counts(&self) -> ListenerCounts {
        ListenerCounts {
            initial: self.initial.len(),
            update: self.update.len(),
            error: self.error.len(),
            status_change: self.status_change.len(),
        }
    }
}

fn snapshot<L: ?Sized>(list: &[(u64, Arc<L>)]) -> Vec<Arc<L>> {
    list.iter().map(|(_, listener)| Arc::clone(listener)).collect()
}

/// # Event Emitter
///
/// Typed registration (`on_initial`, `on_update`, `on_error`,
/// `on_status_change`) and synchronous delivery through [`EventEmitter::emit`].
/// Cheap to share: the listener table lives behind an `Arc`.
pub struct EventEmitter {
    /// Registered listeners, keyed by channel.
    table: Arc<Mutex<ListenerTable>>,
    /// Diagnostics sink shared with the owning connection.
    logger: Arc<Logger>,
}

impl EventEmitter {
    /// Creates an emitter with no listeners.
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            table: Arc::new(Mutex::new(ListenerTable::default())),
            logger,
        }
    }

    /// Registers a listener for decoded `initial` payloads.
    pub fn on_initial<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = {
            let mut table = lock(&self.table);
            let id = table.allocate_id();
            table.initial.push((id, Arc::new(listener)));
            id
        };
        self.registered(EventName::Initial, id)
    }

    /// Registers a listener for decoded `update` payloads.
    pub fn on_update<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = {
            let mut table = lock(&self.table);
            let id = table.allocate_id();
            table.update.push((id, Arc::new(listener)));
            id
        };
        self.registered(EventName::Update, id)
    }

    /// Registers a listener for error reports.
    pub fn on_error<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&ErrorEventData) + Send + Sync + 'static,
    {
        let id = {
            let mut table = lock(&self.table);
            let id = table.allocate_id();
            table.error.push((id, Arc::new(listener)));
            id
        };
        self.registered(EventName::Error, id)
    }

    /// Registers a listener for status transitions.
    pub fn on_status_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&StatusChange) + Send + Sync + 'static,
    {
        let id = {
            let mut table = lock(&self.table);
            let id = table.allocate_id();
            table.status_change.push((id, Arc::new(listener)));
            id
        };
        self.registered(EventName::StatusChange, id)
    }

    fn registered(&self, event: EventName, id: u64) -> Unsubscribe {
        self.logger.debug(
            &format!("Listener added for event: {}", event),
            Some(&json!({ "totalListeners": self.listener_count(event) })),
        );

        let table = Arc::downgrade(&self.table);
        let logger = Arc::clone(&self.logger);
        Unsubscribe::new(move || {
            let Some(table) = table.upgrade() else {
                return;
            };
            let remaining = {
                let mut guard = lock(&table);
                if !guard.remove(event, id) {
                    return;
                }
                guard.counts()
            };
            logger.debug(
                &format!("Listener removed for event: {}", event),
                Some(&json!({ "remaining": remaining })),
            );
        })
    }

    /// Delivers `event` to every listener on its channel.
    pub fn emit(&self, event: &StreamEvent) {
        let name = event.name();
        match event {
            StreamEvent::Initial(data) => {
                let listeners = snapshot(&lock(&self.table).initial);
                self.dispatch(name, &listeners, |listener| listener(data));
            }
            StreamEvent::Update(data) => {
                let listeners = snapshot(&lock(&self.table).update);
                self.dispatch(name, &listeners, |listener| listener(data));
            }
            StreamEvent::Error(data) => {
                let listeners = snapshot(&lock(&self.table).error);
                self.dispatch(name, &listeners, |listener| listener(data));
            }
            StreamEvent::StatusChange(data) => {
                let listeners = snapshot(&lock(&self.table).status_change);
                self.dispatch(name, &listeners, |listener| listener(data));
            }
        }
    }

    fn dispatch<L: ?Sized>(&self, event: EventName, listeners: &[Arc<L>], call: impl Fn(&L)) {
        self.logger.debug(
            &format!("Emitting event: {}", event),
            Some(&json!({ "listenerCount": listeners.len() })),
        );
        for (index, listener) in listeners.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| call(listener)));
            if outcome.is_err() {
                self.logger
                    .error(&format!("Error in {} listener [{}]", event, index), None);
            }
        }
    }

    /// Removes every listener on `event`.
    pub fn remove_listeners(&self, event: EventName) {
        lock(&self.table).clear(event);
        self.logger
            .debug(&format!("All listeners removed for event: {}", event), None);
    }

    /// Removes every listener on every channel.
    pub fn remove_all_listeners(&self) {
        {
            let mut table = lock(&self.table);
            for event in [
                EventName::Initial,
                EventName::Update,
                EventName::Error,
                EventName::StatusChange,
            ] {
                table.clear(event);
            }
        }
        self.logger.debug("All listeners removed", None);
    }

    /// Listeners currently registered on `event`.
    pub fn listener_count(&self, event: EventName) -> usize {
        let counts = self.listener_counts();
        match event {
            EventName::Initial => counts.initial,
            EventName::Update => counts.update,
            EventName::Error => counts.error,
            EventName::StatusChange => counts.status_change,
        }
    }

    /// Listener counts for all channels.
    pub fn listener_counts(&self) -> ListenerCounts {
        lock(&self.table).counts()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_counts())
            .finish()
    }
}
