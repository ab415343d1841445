use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::normalize::{coerce_entity_lines, encoded_size, ensure_timestamp};
use super::types::{
    DataSource, HandlerError, HandlerErrorKind, HandlerOptions, ProcessedData, ProcessedMeta,
    ValidationResult,
};
use super::{Handler, HandlerCore};
use crate::clock::now_millis;
use crate::store::Section;

const NAME: &str = "InitialHandler";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitialHandlerOptions {
    pub debug: bool,
    pub strict: bool,
    /// Top-level keys that must be present and non-null.
    pub required_fields: Vec<String>,
    pub add_timestamp: bool,
}

impl Default for InitialHandlerOptions {
    fn default() -> Self {
        Self {
            debug: false,
            strict: false,
            required_fields: Vec::new(),
            add_timestamp: true,
        }
    }
}

/// Summary of an initial payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialStats {
    pub total_fields: usize,
    pub driver_count: usize,
    pub line_count: usize,
    pub has_session: bool,
    pub has_weather: bool,
}

/// # Initial Handler
///
/// Validates and normalizes the full `initial` snapshot.
pub struct InitialHandler {
    core: HandlerCore,
    required_fields: Vec<String>,
    add_timestamp: bool,
}

impl InitialHandler {
    pub fn new(options: InitialHandlerOptions) -> Self {
        let core = HandlerCore::new(
            NAME,
            HandlerOptions {
                debug: options.debug,
                strict: options.strict,
            },
        );
        Self {
            core,
            required_fields: options.required_fields,
            add_timestamp: options.add_timestamp,
        }
    }

    /// Sets the callback receiving every processed payload.
    pub fn on_processed(mut self, callback: impl Fn(ProcessedData) + Send + Sync + 'static) -> Self {
        self.core.set_on_processed(Box::new(callback));
        self
    }

    /// Sets the callback receiving every failure.
    pub fn on_error(mut self, callback: impl Fn(&HandlerError) + Send + Sync + 'static) -> Self {
        self.core.set_on_error(Box::new(callback));
        self
    }

    pub fn stats(&self, raw: &Value) -> InitialStats {
        let count = |value: Option<&Value>| value.and_then(Value::as_object).map_or(0, |m| m.len());
        let present = |section: Section| raw.get(section.as_str()).is_some_and(|v| !v.is_null());
        InitialStats {
            total_fields: count(Some(raw)),
            driver_count: count(raw.get(Section::DriverList.as_str())),
            line_count: count(raw.pointer("/TimingData/Lines")),
            has_session: present(Section::SessionInfo),
            has_weather: present(Section::WeatherData),
        }
    }

    fn check_section(section: Section, value: &Value, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        let map = match value {
            Value::Null => {
                warnings.push(format!("{} is null", section));
                return;
            }
            Value::Object(map) => map,
            _ => {
                errors.push(format!("{} field must be an object", section));
                return;
            }
        };
        if map.is_empty() {
            warnings.push(format!("{} data is empty", section));
            return;
        }
        if section.has_lines() {
            match map.get("Lines") {
                None => warnings.push(format!("{} has no Lines", section)),
                Some(Value::Object(_)) => {}
                Some(_) => errors.push(format!("{}.Lines must be an object", section)),
            }
        }
    }
}

impl Handler for InitialHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn validate(&self, raw: &Value) -> ValidationResult {
        let Value::Object(data) = raw else {
            return ValidationResult::rejected("Initial Data should be an object");
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if data.is_empty() {
            warnings.push("Initial data is an empty object".to_string());
        }

        for field in &self.required_fields {
            match data.get(field) {
                None => errors.push(format!("Missing required field: {}", field)),
                Some(Value::Null) => errors.push(format!("Required field {} is null", field)),
                Some(_) => {}
            }
        }

        for section in Section::ALL {
            if let Some(value) = data.get(section.as_str()) {
                Self::check_section(section, value, &mut errors, &mut warnings);
            }
        }

        let result = ValidationResult::new(errors, warnings);
        self.core.logger.debug(
            if result.valid { "Validation passed" } else { "Validation failed" },
            Some(&json!({
                "errors": result.errors,
                "warnings": result.warnings,
                "fieldCount": data.len(),
            })),
        );
        result
    }

    fn transform(&self, raw: &Value) -> Result<ProcessedData, HandlerError> {
        let Value::Object(source) = raw else {
            return Err(HandlerError::new(
                HandlerErrorKind::TransformError,
                NAME,
                "Initial data must be an object",
            ));
        };

        let mut data = source.clone();
        if self.add_timestamp {
            ensure_timestamp(&mut data);
        }
        coerce_entity_lines(&mut data);

        let processed = ProcessedData {
            data: Value::Object(data),
            meta: ProcessedMeta {
                processed_at: now_millis(),
                source: DataSource::Initial,
                raw_data_size: encoded_size(raw),
            },
        };
        self.core.logger.debug(
            "Initial data transformation completed",
            Some(&json!({ "dataSize": processed.meta.raw_data_size })),
        );
        Ok(processed)
    }
}
