//! Field-local deep merge over `serde_json::Value`.
//!
//! Rules, applied per key of the source object:
//!
//! - a key absent from the source leaves the target untouched,
//! - `null` in the source writes `null` (explicit clear),
//! - arrays replace wholesale, or dedup-append when `merge_arrays` is set,
//! - objects recurse; a missing or non-object target slot is merged as `{}`,
//! - any other value replaces the target value,
//! - `custom_merge` is consulted first for every key at every depth, and a
//!   `Some` result wins outright.

use serde_json::{Map, Value};

/// Per-key override: `(key, current target value, source value)`.
pub type CustomMerge<'a> = dyn Fn(&str, Option<&Value>, &Value) -> Option<Value> + 'a;

#[derive(Clone, Copy, Default)]
pub struct MergeOptions<'a> {
    /// Append source array items not already present (deep equality)
    /// instead of replacing the array.
    pub merge_arrays: bool,
    pub custom_merge: Option<&'a CustomMerge<'a>>,
}

impl std::fmt::Debug for MergeOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeOptions")
            .field("merge_arrays", &self.merge_arrays)
            .field("custom_merge", &self.custom_merge.is_some())
            .finish()
    }
}

/// Returns `source` merged onto a copy of `target`.
pub fn deep_merge(target: &Value, source: &Value, options: &MergeOptions<'_>) -> Value {
    let mut merged = deep_clone(target);
    merge_into(&mut merged, source, options);
    merged
}

/// Folds `sources` onto `target` in order.
pub fn deep_merge_all(target: &Value, sources: &[Value], options: &MergeOptions<'_>) -> Value {
    let mut merged = deep_clone(target);
    for source in sources {
        merge_into(&mut merged, source, options);
    }
    merged
}

/// In-place variant of [`deep_merge`].
///
/// A `null` source leaves the target unchanged. When either side is not an
/// object the source replaces the target.
pub fn merge_into(target: &mut Value, source: &Value, options: &MergeOptions<'_>) {
    if source.is_null() {
        return;
    }
    if let (Value::Object(target_map), Value::Object(source_map)) = (&mut *target, source) {
        merge_objects(target_map, source_map, options);
        return;
    }
    *target = deep_clone(source);
}

/// Merges `source` onto `target` key by key.
pub fn merge_objects(
    target: &mut Map<String, Value>,
    source: &Map<String, Value>,
    options: &MergeOptions<'_>,
) {
    for (key, source_value) in source {
        if let Some(custom) = options.custom_merge {
            if let Some(value) = custom(key, target.get(key), source_value) {
                target.insert(key.clone(), value);
                continue;
            }
        }

        match source_value {
            Value::Null => {
                target.insert(key.clone(), Value::Null);
            }
            Value::Array(items) => {
                let append = options.merge_arrays && matches!(target.get(key), Some(Value::Array(_)));
                if append {
                    if let Some(Value::Array(existing)) = target.get_mut(key) {
                        append_unique(existing, items);
                    }
                } else {
                    target.insert(key.clone(), Value::Array(items.clone()));
                }
            }
            Value::Object(nested) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(slot_map) = slot {
                    merge_objects(slot_map, nested, options);
                }
            }
            scalar => {
                target.insert(key.clone(), scalar.clone());
            }
        }
    }
}

fn append_unique(existing: &mut Vec<Value>, items: &[Value]) {
    for item in items {
        if !existing.contains(item) {
            existing.push(item.clone());
        }
    }
}

/// Owned structural copy. `Value` has no shared interior, so a plain clone
/// is a full deep copy.
pub fn deep_clone(value: &Value) -> Value {
    value.clone()
}
