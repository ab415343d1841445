//! Lenient deserializers for the feed's loosely typed fields.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::store::merge_strategies::MAX_SLOT_INDEX;

/// Accepts an integer as a JSON number or as a numeric string. `null`, an
/// empty string or anything unparsable yields `None`.
pub fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Reads an ordered collection sent either as an array or as an object keyed
/// by stringified index. Holes (`null` or missing indices) become
/// `T::default()`.
pub fn indexed_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let slots: Vec<(usize, Value)> = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items.into_iter().enumerate().collect(),
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(key, item)| key.parse::<usize>().ok().map(|index| (index, item)))
            .collect(),
        Some(other) => {
            return Err(D::Error::custom(format!(
                "expected array or index-keyed object, found {}",
                other
            )))
        }
    };

    let mut ordered: BTreeMap<usize, Value> = slots
        .into_iter()
        .filter(|(index, _)| *index <= MAX_SLOT_INDEX)
        .collect();
    let len = ordered.keys().next_back().map_or(0, |last| last + 1);
    let mut out = Vec::with_capacity(len);
    for index in 0..len {
        let item = match ordered.remove(&index) {
            None | Some(Value::Null) => T::default(),
            Some(value) => T::deserialize(value).map_err(D::Error::custom)?,
        };
        out.push(item);
    }
    Ok(out)
}

/// Reads a map of entity records keyed by racing number. Entries that are
/// not objects (flags such as `_kf`) are skipped.
pub fn entity_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Object(map)) = value else {
        return Ok(BTreeMap::new());
    };
    map.into_iter()
        .filter(|(_, entry)| entry.is_object())
        .map(|(key, entry)| {
            T::deserialize(entry)
                .map(|record| (key, record))
                .map_err(D::Error::custom)
        })
        .collect()
}
