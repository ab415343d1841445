//! # Data Store
//!
//! Holds the single state tree and fans every change out to subscribers.
//!
//! ## Rules:
//!
//! 1.  **Initial replaces, update merges**: `set_initial_state` swaps the whole
//!     tree; `apply_update` deep-merges a delta onto it. An update that arrives
//!     before any initial state is dropped with a warning.
//! 2.  **Index-aware merge**: `Sectors` goes through the sector reconciler,
//!     `BestSectors` (and any configured extra field) through the generic
//!     indexed-items reconciler. Everything else follows the default
//!     deep-merge rules.
//! 3.  **Owned reads**: every getter returns a copy; callers can never reach
//!     the stored tree.
//! 4.  **Notification outside the lock**: the state lock is released before
//!     subscribers run, and each subscriber is wrapped in `catch_unwind`.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::deep_merge::{merge_objects, MergeOptions};
use super::merge_strategies::{merge_indexed_items, merge_sectors};
use super::state::F1State;
use crate::clock::now_millis;
use crate::loggers::Logger;
use crate::subscription::Unsubscribe;
use crate::sync::lock;

/// # Data Store Options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataStoreOptions {
    pub debug: bool,
    /// Keep a bounded history of past states.
    pub enable_snapshot: bool,
    /// History size; the oldest snapshot is evicted first.
    pub max_snapshots: usize,
    /// Additional keys merged with the indexed-items reconciler, on top of
    /// `BestSectors`.
    pub extra_indexed_fields: Vec<String>,
}

impl Default for DataStoreOptions {
    fn default() -> Self {
        Self {
            debug: false,
            enable_snapshot: false,
            max_snapshots: 10,
            extra_indexed_fields: Vec::new(),
        }
    }
}

/// Event that produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Initial,
    Update,
}

/// Immutable point-in-time copy of the state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: u64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub source: SnapshotSource,
    state: Arc<F1State>,
}

impl Snapshot {
    pub fn state(&self) -> &F1State {
        &self.state
    }
}

/// Counters reported by [`DataStore::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub initialized: bool,
    pub initialized_at: Option<i64>,
    pub last_update_at: Option<i64>,
    pub update_count: u64,
    pub subscriber_count: usize,
    /// Serialized size of the current state in bytes.
    pub state_size: usize,
}

type StateListener = Arc<dyn Fn(Option<&F1State>) + Send + Sync>;
type SelectorListener = Arc<dyn Fn(&F1State) + Send + Sync>;

#[derive(Default)]
struct SubscriberTable {
    next_id: u64,
    full: Vec<(u64, StateListener)>,
    selectors: Vec<(u64, SelectorListener)>,
}

impl SubscriberTable {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn len(&self) -> usize {
        self.full.len() + self.selectors.len()
    }

    fn clear(&mut self) {
        self.full.clear();
        self.selectors.clear();
    }
}

fn snapshot_listeners<L: ?Sized>(list: &[(u64, Arc<L>)]) -> Vec<Arc<L>> {
    list.iter().map(|(_, listener)| Arc::clone(listener)).collect()
}

#[derive(Default)]
struct StoreInner {
    state: Option<Arc<F1State>>,
    initialized_at: Option<i64>,
    last_update_at: Option<i64>,
    update_count: u64,
    state_size: usize,
    snapshots: VecDeque<Snapshot>,
    next_snapshot_id: u64,
    destroyed: bool,
}

impl StoreInner {
    fn push_snapshot(&mut self, state: &Arc<F1State>, source: SnapshotSource, max: usize) -> u64 {
        self.next_snapshot_id += 1;
        self.snapshots.push_back(Snapshot {
            id: self.next_snapshot_id,
            timestamp: now_millis(),
            source,
            state: Arc::clone(state),
        });
        while self.snapshots.len() > max {
            self.snapshots.pop_front();
        }
        self.next_snapshot_id
    }

    fn clear_state(&mut self) {
        self.state = None;
        self.initialized_at = None;
        self.last_update_at = None;
        self.update_count = 0;
        self.state_size = 0;
        self.snapshots.clear();
    }
}

/// # Data Store
///
/// Thread-safe; share it behind an `Arc`.
pub struct DataStore {
    options: DataStoreOptions,
    logger: Arc<Logger>,
    inner: Mutex<StoreInner>,
    subscribers: Arc<Mutex<SubscriberTable>>,
}

impl DataStore {
    pub fn new(options: DataStoreOptions) -> Self {
        let logger = Arc::new(Logger::new("F1DataStore", options.debug));
        logger.info("F1DataStore initialized", Some(&json!({ "options": options })));
        Self {
            options,
            logger,
            inner: Mutex::new(StoreInner::default()),
            subscribers: Arc::new(Mutex::new(SubscriberTable::default())),
        }
    }

    pub fn options(&self) -> &DataStoreOptions {
        &self.options
    }

    /// Replaces the whole state and notifies every subscriber.
    pub fn set_initial_state(&self, data: F1State) {
        self.logger.info(
            "Setting initial state",
            Some(&json!({ "keys": data.keys().collect::<Vec<_>>() })),
        );

        let state = {
            let mut inner = lock(&self.inner);
            if inner.destroyed {
                drop(inner);
                self.logger.warn("Store destroyed, ignoring initial state", None);
                return;
            }
            let now = now_millis();
            let state = Arc::new(data);
            inner.initialized_at = Some(now);
            inner.last_update_at = Some(now);
            inner.state_size = state.encoded_len();
            if self.options.enable_snapshot {
                let id = inner.push_snapshot(&state, SnapshotSource::Initial, self.options.max_snapshots);
                self.logger.debug(
                    "State snapshot created",
                    Some(&json!({ "snapshotId": id, "source": "initial", "totalSnapshots": inner.snapshots.len() })),
                );
            }
            inner.state = Some(Arc::clone(&state));
            state
        };

        self.notify(Some(&state));
        self.logger.info(
            "Initial state setup completed",
            Some(&json!({ "stateSize": lock(&self.inner).state_size })),
        );
    }

    /// Deep-merges `delta` onto the current state and notifies every
    /// subscriber. Dropped with a warning when no state exists yet or when
    /// `delta` is not an object.
    pub fn apply_update(&self, delta: &Value) {
        let Value::Object(delta_map) = delta else {
            self.logger.warn("Update is not an object, ignoring", None);
            return;
        };

        let extra = &self.options.extra_indexed_fields;
        let route = |key: &str, target: Option<&Value>, source: &Value| -> Option<Value> {
            if key == "Sectors" {
                merge_sectors(target, source)
            } else if key == "BestSectors" || extra.iter().any(|field| field == key) {
                merge_indexed_items(target, source)
            } else {
                None
            }
        };
        let merge_options = MergeOptions {
            merge_arrays: false,
            custom_merge: Some(&route),
        };

        let merged = {
            let mut inner = lock(&self.inner);
            let merged = {
                let Some(state) = inner.state.as_mut() else {
                    self.logger.warn("State not initialized, ignoring update", None);
                    return;
                };
                merge_objects(Arc::make_mut(state).as_map_mut(), delta_map, &merge_options);
                Arc::clone(state)
            };

            inner.update_count += 1;
            inner.last_update_at = Some(now_millis());
            inner.state_size = merged.encoded_len();
            if self.options.enable_snapshot {
                inner.push_snapshot(&merged, SnapshotSource::Update, self.options.max_snapshots);
            }
            self.logger.debug(
                "Incremental update completed",
                Some(&json!({
                    "updateKeys": delta_map.keys().collect::<Vec<_>>(),
                    "updateCount": inner.update_count,
                    "stateSize": inner.state_size,
                })),
            );
            merged
        };

        self.notify(Some(&merged));
    }

    /// Registers a full-state subscriber. When state already exists the
    /// callback runs once before this returns.
    ///
    /// The callback receives `None` after [`DataStore::reset`].
    pub fn subscribe<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn(Option<&F1State>) + Send + Sync + 'static,
    {
        if self.is_destroyed() {
            self.logger.warn("Store destroyed, subscription refused", None);
            return Unsubscribe::noop();
        }

        let listener: StateListener = Arc::new(callback);
        let (id, total) = {
            let mut table = lock(&self.subscribers);
            let id = table.allocate_id();
            table.full.push((id, Arc::clone(&listener)));
            (id, table.len())
        };
        self.logger
            .debug("New subscriber added", Some(&json!({ "totalSubscribers": total })));

        if let Some(state) = self.current() {
            self.guarded("Subscriber callback error", || listener(Some(&state)));
        }

        let table = Arc::downgrade(&self.subscribers);
        let logger = Arc::clone(&self.logger);
        Unsubscribe::new(move || {
            let Some(table) = table.upgrade() else {
                return;
            };
            let total = {
                let mut guard = lock(&table);
                guard.full.retain(|(entry, _)| *entry != id);
                guard.len()
            };
            logger.debug("Subscriber removed", Some(&json!({ "totalSubscribers": total })));
        })
    }

    /// Registers a projection of the state plus a callback for the projected
    /// value. Fires on every change while state exists; values are not
    /// compared.
    pub fn subscribe_selector<T, S, F>(&self, selector: S, callback: F) -> Unsubscribe
    where
        S: Fn(&F1State) -> T + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        if self.is_destroyed() {
            self.logger.warn("Store destroyed, subscription refused", None);
            return Unsubscribe::noop();
        }

        let listener: SelectorListener = Arc::new(move |state: &F1State| callback(selector(state)));
        let (id, total) = {
            let mut table = lock(&self.subscribers);
            let id = table.allocate_id();
            table.selectors.push((id, Arc::clone(&listener)));
            (id, table.selectors.len())
        };
        self.logger.debug(
            "New selector subscriber added",
            Some(&json!({ "totalSelectorSubscribers": total })),
        );

        if let Some(state) = self.current() {
            self.guarded("Selector subscriber callback error", || listener(&state));
        }

        let table = Arc::downgrade(&self.subscribers);
        let logger = Arc::clone(&self.logger);
        Unsubscribe::new(move || {
            let Some(table) = table.upgrade() else {
                return;
            };
            let total = {
                let mut guard = lock(&table);
                guard.selectors.retain(|(entry, _)| *entry != id);
                guard.selectors.len()
            };
            logger.debug(
                "Selector subscriber removed",
                Some(&json!({ "totalSelectorSubscribers": total })),
            );
        })
    }

    fn notify(&self, state: Option<&F1State>) {
        let (full, selectors) = {
            let table = lock(&self.subscribers);
            (
                snapshot_listeners(&table.full),
                snapshot_listeners(&table.selectors),
            )
        };

        for listener in &full {
            self.guarded("Error notifying subscriber", || listener(state));
        }
        if let Some(state) = state {
            for listener in &selectors {
                self.guarded("Error notifying selector subscriber", || listener(state));
            }
        }
    }

    fn guarded(&self, context: &str, call: impl FnOnce()) {
        if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
            self.logger.error(context, None);
        }
    }

    fn current(&self) -> Option<Arc<F1State>> {
        lock(&self.inner).state.clone()
    }

    /// Copy of the current state.
    pub fn get_state(&self) -> Option<F1State> {
        self.current().map(|state| (*state).clone())
    }

    /// Copy of one top-level section. `None` when absent or `null`.
    pub fn get_state_slice(&self, key: &str) -> Option<Value> {
        let state = self.current()?;
        state.get(key).filter(|value| !value.is_null()).cloned()
    }

    /// Runs `selector` against the current state. `None` before the first
    /// initial state or when the selector panics.
    pub fn select<T>(&self, selector: impl FnOnce(&F1State) -> T) -> Option<T> {
        let state = self.current()?;
        match panic::catch_unwind(AssertUnwindSafe(|| selector(&state))) {
            Ok(value) => Some(value),
            Err(_) => {
                self.logger.error("Error executing selector", None);
                None
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.inner).state.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner).destroyed
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    pub fn stats(&self) -> StoreStats {
        let subscriber_count = self.subscriber_count();
        let inner = lock(&self.inner);
        StoreStats {
            initialized: inner.state.is_some(),
            initialized_at: inner.initialized_at,
            last_update_at: inner.last_update_at,
            update_count: inner.update_count,
            subscriber_count,
            state_size: inner.state_size,
        }
    }

    /// Retained snapshots, oldest first.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        lock(&self.inner).snapshots.iter().cloned().collect()
    }

    /// Makes the snapshot with `id` the current state and notifies
    /// subscribers. Returns `false` when no such snapshot is retained.
    pub fn restore_snapshot(&self, id: u64) -> bool {
        let state = {
            let mut inner = lock(&self.inner);
            let Some(snapshot) = inner.snapshots.iter().find(|s| s.id == id) else {
                self.logger
                    .warn("Snapshot not found", Some(&json!({ "snapshotId": id })));
                return false;
            };
            let state = Arc::clone(&snapshot.state);
            inner.last_update_at = Some(now_millis());
            inner.state_size = state.encoded_len();
            inner.state = Some(Arc::clone(&state));
            state
        };

        self.notify(Some(&state));
        self.logger
            .info("Snapshot restored", Some(&json!({ "snapshotId": id })));
        true
    }

    pub fn clear_snapshots(&self) {
        lock(&self.inner).snapshots.clear();
        self.logger.debug("All snapshots cleared", None);
    }

    /// Drops the state and snapshots but keeps subscribers. Full-state
    /// subscribers are told the state is gone.
    pub fn reset(&self) {
        self.logger.info("Store reset", None);
        lock(&self.inner).clear_state();
        self.notify(None);
    }

    /// Drops the state, snapshots and every subscriber. The store accepts no
    /// further state or subscriptions.
    pub fn destroy(&self) {
        self.logger.info("Store destroyed", None);
        {
            let mut inner = lock(&self.inner);
            inner.clear_state();
            inner.destroyed = true;
        }
        lock(&self.subscribers).clear();
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(DataStoreOptions::default())
    }
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state(value: Value) -> F1State {
        F1State::from_value(value).unwrap()
    }

    fn snapshot_store() -> DataStore {
        DataStore::new(DataStoreOptions {
            enable_snapshot: true,
            max_snapshots: 2,
            ..DataStoreOptions::default()
        })
    }

    #[test]
    fn test_update_before_initial_is_dropped() {
        let store = DataStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let _sub = store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.apply_update(&json!({"LapCount": {"CurrentLap": 2}}));
        assert!(!store.is_initialized());
        assert_eq!(store.get_state(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_initial_replaces_whole_state() {
        let store = DataStore::default();
        store.set_initial_state(state(json!({"A": 1, "B": {"x": 1}})));
        store.set_initial_state(state(json!({"B": {"y": 2}})));
        assert_eq!(store.get_state(), Some(state(json!({"B": {"y": 2}}))));
        assert!(store.is_initialized());
    }

    #[test]
    fn test_update_merges_field_locally() {
        let store = DataStore::default();
        store.set_initial_state(state(json!({
            "TimingData": {"Lines": {"1": {"Position": 1, "GapToLeader": ""}}},
            "WeatherData": {"AirTemp": "24.1"}
        })));
        store.apply_update(&json!({"TimingData": {"Lines": {"1": {"GapToLeader": "+0.5"}}}}));

        let current = store.get_state().unwrap();
        assert_eq!(
            current.get("TimingData"),
            Some(&json!({"Lines": {"1": {"Position": 1, "GapToLeader": "+0.5"}}}))
        );
        assert_eq!(current.get("WeatherData"), Some(&json!({"AirTemp": "24.1"})));
        assert_eq!(store.stats().update_count, 1);
    }

    #[test]
    fn test_sectors_sparse_update_through_store() {
        let store = DataStore::default();
        store.set_initial_state(state(json!({
            "TimingData": {"Lines": {"44": {"Sectors": [
                {"Value": "10.1"}, {"Value": "20.2"}, {"Value": "30.3"}
            ]}}}
        })));
        store.apply_update(&json!({
            "TimingData": {"Lines": {"44": {"Sectors": {"1": {"Value": "21.0"}}}}}
        }));

        let sectors = store.select(|s| s.get("TimingData").cloned()).flatten().unwrap();
        assert_eq!(
            sectors["Lines"]["44"]["Sectors"],
            json!([{"Value": "10.1"}, {"Value": "21.0"}, {"Value": "30.3"}])
        );
    }

    #[test]
    fn test_best_sectors_and_extra_fields_use_indexed_merge() {
        let store = DataStore::new(DataStoreOptions {
            extra_indexed_fields: vec!["Stints".to_string()],
            ..DataStoreOptions::default()
        });
        store.set_initial_state(state(json!({
            "TimingStats": {"Lines": {"1": {"BestSectors": [{"Value": "a"}, {"Value": "b"}]}}},
            "TimingAppData": {"Lines": {"1": {"Stints": [{"Compound": "SOFT", "TotalLaps": 3}]}}}
        })));
        store.apply_update(&json!({
            "TimingStats": {"Lines": {"1": {"BestSectors": {"1": {"Value": "c"}}}}},
            "TimingAppData": {"Lines": {"1": {"Stints": {"0": {"TotalLaps": 4}}}}}
        }));

        let current = store.get_state().unwrap();
        assert_eq!(
            current.get("TimingStats").unwrap()["Lines"]["1"]["BestSectors"],
            json!([{"Value": "a"}, {"Value": "c"}])
        );
        assert_eq!(
            current.get("TimingAppData").unwrap()["Lines"]["1"]["Stints"],
            json!([{"Compound": "SOFT", "TotalLaps": 4}])
        );
    }

    #[test]
    fn test_null_clears_section() {
        let store = DataStore::default();
        store.set_initial_state(state(json!({"WeatherData": {"AirTemp": "20"}, "LapCount": {"CurrentLap": 3}})));
        store.apply_update(&json!({"WeatherData": null}));
        assert_eq!(store.get_state_slice("WeatherData"), None);
        assert_eq!(store.get_state_slice("LapCount"), Some(json!({"CurrentLap": 3})));
    }

    #[test]
    fn test_subscribe_fires_immediately_when_initialized() {
        let store = DataStore::default();
        store.set_initial_state(state(json!({"A": 1})));

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let sub = store.subscribe(move |state| {
            assert!(state.is_some());
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.apply_update(&json!({"A": 2}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        sub.unsubscribe();
        store.apply_update(&json!({"A": 3}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_selector_fires_on_every_change() {
        let store = DataStore::default();
        let values = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&values);
        let _sub = store.subscribe_selector(
            |state| state.get("LapCount").cloned(),
            move |value| seen.lock().unwrap().push(value),
        );

        store.set_initial_state(state(json!({"LapCount": {"CurrentLap": 1}, "Other": 0})));
        store.apply_update(&json!({"Other": 1}));
        store.apply_update(&json!({"LapCount": {"CurrentLap": 2}}));

        let values = values.lock().unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], values[1]);
        assert_eq!(values[2], Some(json!({"CurrentLap": 2})));
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let store = DataStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let _bad = store.subscribe(|state| {
            if state.is_some() {
                panic!("subscriber failure");
            }
        });
        let _bad_selector = store.subscribe_selector(|_| -> u8 { panic!("selector failure") }, |_| {});
        let seen = Arc::clone(&calls);
        let _good = store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.set_initial_state(state(json!({"A": 1})));
        store.apply_update(&json!({"A": 2}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get_state_slice("A"), Some(json!(2)));
    }

    #[test]
    fn test_get_state_returns_detached_copy() {
        let store = DataStore::default();
        store.set_initial_state(state(json!({"A": {"b": 1}})));
        let mut copy = store.get_state().unwrap();
        copy.as_map_mut().insert("A".to_string(), json!("mutated"));
        assert_eq!(store.get_state_slice("A"), Some(json!({"b": 1})));
    }

    #[test]
    fn test_select_returns_none_on_panic() {
        let store = DataStore::default();
        assert_eq!(store.select(|s| s.len()), None);
        store.set_initial_state(state(json!({"A": 1})));
        assert_eq!(store.select(|s| s.len()), Some(1));
        assert_eq!(store.select(|_| -> usize { panic!("boom") }), None);
    }

    #[test]
    fn test_reset_keeps_subscribers_and_notifies_absent_state() {
        let store = snapshot_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |state| sink.lock().unwrap().push(state.is_some()));

        store.set_initial_state(state(json!({"A": 1})));
        store.reset();

        assert!(!store.is_initialized());
        assert!(store.snapshots().is_empty());
        assert_eq!(store.subscriber_count(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);

        store.set_initial_state(state(json!({"A": 2})));
        assert_eq!(*seen.lock().unwrap(), vec![true, false, true]);
    }

    #[test]
    fn test_destroy_is_terminal() {
        let store = DataStore::default();
        let _sub = store.subscribe(|_| {});
        store.set_initial_state(state(json!({"A": 1})));
        store.destroy();

        assert!(store.is_destroyed());
        assert_eq!(store.subscriber_count(), 0);
        assert_eq!(store.get_state(), None);

        store.set_initial_state(state(json!({"A": 2})));
        assert!(!store.is_initialized());
        let sub = store.subscribe(|_| {});
        assert_eq!(store.subscriber_count(), 0);
        sub.unsubscribe();
    }

    #[test]
    fn test_snapshots_are_bounded_and_restorable() {
        let store = snapshot_store();
        store.set_initial_state(state(json!({"n": 0})));
        store.apply_update(&json!({"n": 1}));
        store.apply_update(&json!({"n": 2}));

        let snapshots = store.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].source, SnapshotSource::Update);
        assert_eq!(snapshots[0].state().get("n"), Some(&json!(1)));
        assert!(snapshots[0].id < snapshots[1].id);

        assert!(store.restore_snapshot(snapshots[0].id));
        assert_eq!(store.get_state_slice("n"), Some(json!(1)));
        assert!(!store.restore_snapshot(999));

        store.clear_snapshots();
        assert!(store.snapshots().is_empty());
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_updates() {
        let store = snapshot_store();
        store.set_initial_state(state(json!({"n": {"v": 0}})));
        store.apply_update(&json!({"n": {"v": 1}}));
        assert_eq!(store.snapshots()[0].state().get("n"), Some(&json!({"v": 0})));
    }

    #[test]
    fn test_stats_track_lifecycle() {
        let store = DataStore::default();
        let _a = store.subscribe(|_| {});
        let _b = store.subscribe_selector(|s| s.len(), |_| {});

        let stats = store.stats();
        assert!(!stats.initialized);
        assert_eq!(stats.subscriber_count, 2);
        assert_eq!(stats.initialized_at, None);

        store.set_initial_state(state(json!({"A": 1})));
        store.apply_update(&json!({"B": 2}));
        let stats = store.stats();
        assert!(stats.initialized);
        assert!(stats.initialized_at.is_some());
        assert_eq!(stats.update_count, 1);
        assert_eq!(stats.state_size, r#"{"A":1,"B":2}"#.len());
    }
}
