//! # Store Module
//!
//! The reactive state container.
//!
//! ## Core Components:
//!
//! - **`data_store`**: `DataStore`, the single state tree with full-state and
//!   selector subscriptions plus optional snapshot history.
//! - **`deep_merge`**: field-local merge of a delta into existing state.
//! - **`merge_strategies`**: reconciliation of ordered sub-collections that
//!   arrive either as arrays or as sparse index-keyed objects.
//! - **`state`**: `F1State` and the `Section` catalogue.

pub mod data_store;
pub mod deep_merge;
pub mod merge_strategies;
pub mod state;

// --- Public API Re-exports ---
pub use data_store::{DataStore, DataStoreOptions, Snapshot, SnapshotSource, StoreStats};
pub use deep_merge::{deep_clone, deep_merge, deep_merge_all, merge_into, CustomMerge, MergeOptions};
pub use merge_strategies::{merge_indexed_items, merge_sectors, merge_segments, IndexedSlots};
pub use state::{F1State, Section};
