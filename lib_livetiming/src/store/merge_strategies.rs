//! # Ordered Sub-collection Reconciliation
//!
//! Some state fields are logically a fixed sequence of slots (three sectors,
//! N mini-segments per sector, best sector times) but arrive on the wire in
//! two shapes: a dense array, or a sparse object keyed by stringified index
//! that carries only the slots that changed.
//!
//! Both shapes are read into one [`IndexedSlots`] representation, merged
//! slot by slot, and written back in the shape the existing state already
//! used. A dense target therefore stays dense with length
//! `max(existing, highest delta index + 1)`, and every slot the delta does
//! not name keeps its value.
//!
//! Every function here returns `None` when the delta is `null` or not a
//! collection, so the caller falls back to the default merge rules.
//!
//! Slot indices are bounded by [`MAX_SLOT_INDEX`]. Against a dense target,
//! delta entries that do not name a slot in range (larger indices,
//! non-canonical keys such as `"01"`, array items past the bound) are
//! dropped with a warning, so the length rule holds only up to the bound.
//! A sparse target keeps such keys verbatim.

use log::warn;
use serde_json::{Map, Value};

const LOG_TARGET: &str = "livetiming::store";

/// Indices above this are not materialized as dense slots.
pub const MAX_SLOT_INDEX: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Dense,
    Sparse,
}

/// Key of one delta entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKey<'a> {
    Index(usize),
    Named(&'a str),
}

/// Tagged internal form of an ordered collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedSlots {
    shape: Shape,
    /// Slot values by index; `None` marks a hole.
    slots: Vec<Option<Value>>,
    /// Non-index keys of a sparse collection, preserved verbatim.
    named: Map<String, Value>,
}

/// Parses a canonical non-negative integer key (`"0"`, `"12"`, not `"01"`).
fn parse_index(key: &str) -> Option<usize> {
    let index: usize = key.parse().ok()?;
    (index.to_string() == key && index <= MAX_SLOT_INDEX).then_some(index)
}

/// Delta entries plus the number of array items cut off at the bound.
fn delta_entries(delta: &Value) -> Option<(Vec<(SlotKey<'_>, &Value)>, usize)> {
    match delta {
        Value::Array(items) => Some((
            items
                .iter()
                .enumerate()
                .take(MAX_SLOT_INDEX + 1)
                .map(|(index, value)| (SlotKey::Index(index), value))
                .collect(),
            items.len().saturating_sub(MAX_SLOT_INDEX + 1),
        )),
        Value::Object(map) => Some((
            map.iter()
                .map(|(key, value)| match parse_index(key) {
                    Some(index) => (SlotKey::Index(index), value),
                    None => (SlotKey::Named(key.as_str()), value),
                })
                .collect(),
            0,
        )),
        _ => None,
    }
}

impl IndexedSlots {
    /// Reads the existing collection. A missing or non-collection target
    /// starts as an empty dense sequence.
    pub fn from_target(target: Option<&Value>) -> Self {
        match target {
            Some(Value::Array(items)) => Self {
                shape: Shape::Dense,
                slots: items.iter().cloned().map(Some).collect(),
                named: Map::new(),
            },
            Some(Value::Object(map)) => {
                let mut slots = Self {
                    shape: Shape::Sparse,
                    slots: Vec::new(),
                    named: Map::new(),
                };
                for (key, value) in map {
                    match parse_index(key) {
                        Some(index) => slots.put(index, value.clone()),
                        None => {
                            slots.named.insert(key.clone(), value.clone());
                        }
                    }
                }
                slots
            }
            _ => Self {
                shape: Shape::Dense,
                slots: Vec::new(),
                named: Map::new(),
            },
        }
    }

    pub fn is_dense(&self) -> bool {
        self.shape == Shape::Dense
    }

    /// Number of slots, holes included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.named.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn put(&mut self, index: usize, value: Value) {
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(value);
    }

    /// Applies every non-null delta entry through `merge_entry`. Returns the
    /// number of entries dropped, or `None` when `delta` is not a collection.
    fn apply(
        &mut self,
        delta: &Value,
        merge_entry: fn(Option<&Value>, &Value) -> Value,
    ) -> Option<usize> {
        let (entries, mut dropped) = delta_entries(delta)?;
        for (key, value) in entries {
            if value.is_null() {
                continue;
            }
            match key {
                SlotKey::Index(index) => {
                    let merged = merge_entry(self.get(index), value);
                    self.put(index, merged);
                }
                SlotKey::Named(name) => {
                    if self.shape == Shape::Sparse {
                        let merged = merge_entry(self.named.get(name), value);
                        self.named.insert(name.to_string(), merged);
                    } else {
                        dropped += 1;
                    }
                }
            }
        }
        if dropped > 0 {
            warn!(
                target: LOG_TARGET,
                "Dropped {} delta entries outside the slot range 0..={} of a dense collection",
                dropped,
                MAX_SLOT_INDEX
            );
        }
        Some(dropped)
    }

    /// Writes the collection back in its original shape.
    pub fn into_value(self) -> Value {
        match self.shape {
            Shape::Dense => Value::Array(
                self.slots
                    .into_iter()
                    .map(|slot| slot.unwrap_or(Value::Null))
                    .collect(),
            ),
            Shape::Sparse => {
                let mut map = self.named;
                for (index, slot) in self.slots.into_iter().enumerate() {
                    if let Some(value) = slot {
                        map.insert(index.to_string(), value);
                    }
                }
                Value::Object(map)
            }
        }
    }
}

fn reconcile(
    target: Option<&Value>,
    delta: &Value,
    merge_entry: fn(Option<&Value>, &Value) -> Value,
) -> Option<Value> {
    if !(delta.is_array() || delta.is_object()) {
        return None;
    }
    let mut slots = IndexedSlots::from_target(target);
    slots.apply(delta, merge_entry)?;
    Some(slots.into_value())
}

/// Shallow field merge: the delta's fields overwrite, the rest survive.
fn merge_fields(existing: Option<&Value>, delta: &Value) -> Value {
    let Value::Object(delta_map) = delta else {
        return delta.clone();
    };
    let mut merged = match existing {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in delta_map {
        merged.insert(key.clone(), value.clone());
    }
    Value::Object(merged)
}

/// Shallow sector merge; `Segments` recurses through [`merge_segments`].
fn merge_sector(existing: Option<&Value>, delta: &Value) -> Value {
    let Value::Object(delta_map) = delta else {
        return delta.clone();
    };
    let mut merged = match existing {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in delta_map {
        let next = if key == "Segments" {
            merge_segments(merged.get(key), value).unwrap_or_else(|| value.clone())
        } else {
            value.clone()
        };
        merged.insert(key.clone(), next);
    }
    Value::Object(merged)
}

/// Reconciles a `Sectors` collection. Sector entries merge field by field
/// and their `Segments` reconcile independently.
///
/// With no existing collection the result is always a dense array: a sparse
/// delta such as `{"1": {...}}` becomes `[null, {...}]` rather than being
/// stored as an object, so later array-shaped deltas line up with it.
/// Indices above [`MAX_SLOT_INDEX`] are dropped for dense targets.
pub fn merge_sectors(target: Option<&Value>, delta: &Value) -> Option<Value> {
    reconcile(target, delta, merge_sector)
}

/// Reconciles a `Segments` collection. Segment entries merge field by field.
/// Same shape and index bound rules as [`merge_sectors`].
pub fn merge_segments(target: Option<&Value>, delta: &Value) -> Option<Value> {
    reconcile(target, delta, merge_fields)
}

/// Reconciles any indexed collection of records (`BestSectors`, ...).
/// Same shape and index bound rules as [`merge_sectors`].
pub fn merge_indexed_items(target: Option<&Value>, delta: &Value) -> Option<Value> {
    reconcile(target, delta, merge_fields)
}
