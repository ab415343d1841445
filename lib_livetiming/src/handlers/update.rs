use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::normalize::{coerce_entity_lines, drop_empty_sections, encoded_size, ensure_timestamp};
use super::types::{
    DataSource, HandlerError, HandlerErrorKind, HandlerOptions, ProcessedData, ProcessedMeta,
    ValidationResult,
};
use super::{Handler, HandlerCore};
use crate::clock::now_millis;
use crate::store::Section;

const NAME: &str = "UpdateHandler";

/// Keys that never count as update content.
const META_KEYS: &[&str] = &["timestamp", "meta"];

/// Tolerated clock skew before a payload timestamp counts as future.
const FUTURE_SKEW_MS: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateHandlerOptions {
    pub debug: bool,
    pub strict: bool,
    /// Accept updates without content (with a warning).
    pub allow_empty: bool,
    pub add_timestamp: bool,
    /// Updates closer together than this produce a warning. `0` disables it.
    pub min_update_interval_ms: u64,
}

impl Default for UpdateHandlerOptions {
    fn default() -> Self {
        Self {
            debug: false,
            strict: false,
            allow_empty: false,
            add_timestamp: true,
            min_update_interval_ms: 0,
        }
    }
}

/// Summary of an update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStats {
    pub has_data: bool,
    pub updated_fields: Vec<String>,
    pub line_update_count: usize,
    /// Milliseconds since the last processed update, `0` if none yet.
    pub time_since_last_update_ms: i64,
}

/// # Update Handler
///
/// Validates and normalizes partial `update` deltas. Remembers when it last
/// processed one, for the frequency warning only.
pub struct UpdateHandler {
    core: HandlerCore,
    allow_empty: bool,
    add_timestamp: bool,
    min_update_interval_ms: i64,
    /// Epoch ms of the last transform, `0` when unset.
    last_update_time: AtomicI64,
}

/// Whether `data` carries anything beyond metadata keys. Nulls, empty
/// objects and empty arrays do not count.
pub fn has_actual_data(data: &Value) -> bool {
    let Value::Object(map) = data else {
        return false;
    };
    map.iter()
        .filter(|(key, _)| !META_KEYS.contains(&key.as_str()))
        .any(|(_, value)| match value {
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
            Value::Object(fields) => !fields.is_empty(),
            _ => true,
        })
}

impl UpdateHandler {
    pub fn new(options: UpdateHandlerOptions) -> Self {
        let core = HandlerCore::new(
            NAME,
            HandlerOptions {
                debug: options.debug,
                strict: options.strict,
            },
        );
        Self {
            core,
            allow_empty: options.allow_empty,
            add_timestamp: options.add_timestamp,
            min_update_interval_ms: i64::try_from(options.min_update_interval_ms).unwrap_or(i64::MAX),
            last_update_time: AtomicI64::new(0),
        }
    }

    pub fn on_processed(mut self, callback: impl Fn(ProcessedData) + Send + Sync + 'static) -> Self {
        self.core.set_on_processed(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&HandlerError) + Send + Sync + 'static) -> Self {
        self.core.set_on_error(Box::new(callback));
        self
    }

    /// Epoch ms of the last processed update.
    pub fn last_update_time(&self) -> Option<i64> {
        match self.last_update_time.load(Ordering::Relaxed) {
            0 => None,
            at => Some(at),
        }
    }

    pub fn reset_last_update_time(&self) {
        self.last_update_time.store(0, Ordering::Relaxed);
        self.core.logger.debug("Last update time reset", None);
    }

    pub fn stats(&self, raw: &Value) -> UpdateStats {
        let updated_fields = raw
            .as_object()
            .map(|map| {
                map.keys()
                    .filter(|key| !META_KEYS.contains(&key.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        UpdateStats {
            has_data: has_actual_data(raw),
            updated_fields,
            line_update_count: raw
                .pointer("/TimingData/Lines")
                .and_then(Value::as_object)
                .map_or(0, |lines| lines.len()),
            time_since_last_update_ms: self
                .last_update_time()
                .map_or(0, |at| now_millis() - at),
        }
    }
}

impl Handler for UpdateHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn validate(&self, raw: &Value) -> ValidationResult {
        let Value::Object(data) = raw else {
            return ValidationResult::rejected("Update Data should be an object");
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let now = now_millis();

        let has_data = has_actual_data(raw);
        if !has_data {
            if self.allow_empty {
                warnings.push("Update Data is empty".to_string());
            } else {
                errors.push("Update Data cannot be empty".to_string());
            }
        }

        if let Some(last) = self.last_update_time() {
            let elapsed = now - last;
            if self.min_update_interval_ms > 0 && elapsed < self.min_update_interval_ms {
                warnings.push(format!(
                    "Updates are too frequent: {} < {}ms",
                    elapsed, self.min_update_interval_ms
                ));
            }
        }

        for section in Section::ALL {
            match data.get(section.as_str()) {
                None | Some(Value::Null) | Some(Value::Object(_)) => {}
                Some(_) => errors.push(format!("{} field must be an object", section)),
            }
        }

        if let Some(timestamp) = data.get("timestamp") {
            match timestamp.as_f64() {
                None => warnings.push("timestamp field should be a number".to_string()),
                Some(ts) if ts > (now + FUTURE_SKEW_MS) as f64 => warnings
                    .push("timestamp is in the future (possible timezone issue)".to_string()),
                Some(_) => {}
            }
        }

        let result = ValidationResult::new(errors, warnings);
        self.core.logger.debug(
            if result.valid { "Validation passed" } else { "Validation failed" },
            Some(&json!({
                "errors": result.errors,
                "warnings": result.warnings,
                "hasData": has_data,
            })),
        );
        result
    }

    fn transform(&self, raw: &Value) -> Result<ProcessedData, HandlerError> {
        let Value::Object(source) = raw else {
            return Err(HandlerError::new(
                HandlerErrorKind::TransformError,
                NAME,
                "Update data must be an object",
            ));
        };

        let mut data = source.clone();
        if self.add_timestamp {
            ensure_timestamp(&mut data);
        }
        coerce_entity_lines(&mut data);
        drop_empty_sections(&mut data);

        let processed_at = now_millis();
        self.last_update_time.store(processed_at, Ordering::Relaxed);

        let processed = ProcessedData {
            data: Value::Object(data),
            meta: ProcessedMeta {
                processed_at,
                source: DataSource::Update,
                raw_data_size: encoded_size(raw),
            },
        };
        self.core.logger.debug(
            "Update data transformed",
            Some(&json!({ "dataSize": processed.meta.raw_data_size })),
        );
        Ok(processed)
    }
}
