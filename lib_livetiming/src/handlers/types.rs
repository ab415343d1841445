use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Options shared by every handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HandlerOptions {
    pub debug: bool,
    /// Return failures as `Err` from `handle` instead of only reporting them.
    pub strict: bool,
}

/// Outcome of a handler's validation step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Valid exactly when `errors` is empty.
    pub fn new(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self::new(vec![error.into()], Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandlerErrorKind {
    ValidationError,
    TransformError,
    UnknownError,
}

/// A failure inside a handler pipeline. Always passed to the handler's
/// error callback; returned from `handle` only in strict mode.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{handler}] {message}")]
pub struct HandlerError {
    pub kind: HandlerErrorKind,
    pub handler: &'static str,
    pub message: String,
    /// Individual validation failures.
    pub errors: Vec<String>,
    /// The rejected payload, kept only when the handler runs with `debug`.
    pub original_data: Option<Value>,
}

impl HandlerError {
    pub fn new(kind: HandlerErrorKind, handler: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            handler,
            message: message.into(),
            errors: Vec::new(),
            original_data: None,
        }
    }

    pub fn validation(handler: &'static str, errors: Vec<String>) -> Self {
        let message = format!("Data validation failed: {}", errors.join(", "));
        Self {
            errors,
            ..Self::new(HandlerErrorKind::ValidationError, handler, message)
        }
    }

    pub fn with_original_data(mut self, data: Option<Value>) -> Self {
        self.original_data = data;
        self
    }
}

/// Which stream event a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Initial,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedMeta {
    /// Epoch milliseconds.
    pub processed_at: i64,
    pub source: DataSource,
    /// Length of the raw payload in compact JSON form.
    pub raw_data_size: usize,
}

/// A normalized payload ready for the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedData {
    pub data: Value,
    pub meta: ProcessedMeta,
}
