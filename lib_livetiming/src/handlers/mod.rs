//! # Handlers Module
//!
//! Validation and normalization of raw stream payloads before they reach
//! the store.
//!
//! Every handler runs the same three-step template, provided by
//! [`Handler::handle`]:
//!
//! 1.  **Validate**: shape checks producing a [`ValidationResult`]. A failed
//!     validation is reported through the error callback as a
//!     `ValidationError`.
//! 2.  **Transform**: clone, normalize (timestamp, integer coercion of entity
//!     line fields) and wrap with [`ProcessedMeta`].
//! 3.  **Deliver**: pass the [`ProcessedData`] to the processed callback.
//!
//! A panic in steps 2 or 3 is caught and reported as an `UnknownError`.
//! Failures are returned as `Err` only when the handler is `strict`;
//! otherwise the payload is dropped and reported.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde_json::{json, Value};

use crate::loggers::Logger;

pub mod initial;
pub mod normalize;
pub mod types;
pub mod update;

// --- Public API Re-exports ---
pub use initial::{InitialHandler, InitialHandlerOptions, InitialStats};
pub use types::{
    DataSource, HandlerError, HandlerErrorKind, HandlerOptions, ProcessedData, ProcessedMeta,
    ValidationResult,
};
pub use update::{UpdateHandler, UpdateHandlerOptions, UpdateStats};

pub type ProcessedCallback = Box<dyn Fn(ProcessedData) + Send + Sync>;
pub type ErrorCallback = Box<dyn Fn(&HandlerError) + Send + Sync>;

/// State every handler carries: options, logger and the two callbacks.
pub struct HandlerCore {
    pub(crate) options: HandlerOptions,
    pub(crate) logger: Logger,
    on_processed: Option<ProcessedCallback>,
    on_error: Option<ErrorCallback>,
}

impl HandlerCore {
    pub fn new(name: &'static str, options: HandlerOptions) -> Self {
        Self {
            options,
            logger: Logger::new(name, options.debug),
            on_processed: None,
            on_error: None,
        }
    }

    pub fn options(&self) -> HandlerOptions {
        self.options
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub(crate) fn set_on_processed(&mut self, callback: ProcessedCallback) {
        self.on_processed = Some(callback);
    }

    pub(crate) fn set_on_error(&mut self, callback: ErrorCallback) {
        self.on_error = Some(callback);
    }

    /// Raw payload attached to errors, only in debug mode.
    fn original_data(&self, raw: &Value) -> Option<Value> {
        self.options.debug.then(|| raw.clone())
    }

    /// Reports `error` and decides the return value of `handle`.
    fn fail(&self, error: HandlerError) -> Result<(), HandlerError> {
        if let Some(on_error) = &self.on_error {
            if panic::catch_unwind(AssertUnwindSafe(|| on_error(&error))).is_err() {
                self.logger.error("Error callback panicked", None);
            }
        }
        if self.options.strict {
            Err(error)
        } else {
            Ok(())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown error".to_string()
    }
}

/// # Handler
///
/// Implementors supply `validate` and `transform`; `handle` is the shared
/// pipeline and is normally not overridden.
pub trait Handler {
    fn name(&self) -> &'static str;

    fn core(&self) -> &HandlerCore;

    fn validate(&self, raw: &Value) -> ValidationResult;

    fn transform(&self, raw: &Value) -> Result<ProcessedData, HandlerError>;

    fn handle(&self, raw: &Value) -> Result<(), HandlerError> {
        let core = self.core();
        core.logger.debug(
            "Started handling data",
            Some(&json!({ "dataType": normalize::json_type(raw) })),
        );

        let validation = self.validate(raw);
        if !validation.valid {
            core.logger.error(
                "Data validation failed",
                Some(&json!({ "errors": validation.errors })),
            );
            let error = HandlerError::validation(self.name(), validation.errors)
                .with_original_data(core.original_data(raw));
            return core.fail(error);
        }
        for warning in &validation.warnings {
            core.logger.warn(warning, None);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), HandlerError> {
            let processed = self.transform(raw)?;
            core.logger.debug("Data transformed", None);
            if let Some(on_processed) = &core.on_processed {
                on_processed(processed);
            }
            Ok(())
        }));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => {
                core.logger
                    .error("Transform failed", Some(&json!({ "message": error.message })));
                core.fail(error.with_original_data(core.original_data(raw)))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                core.logger
                    .error("Unknown error", Some(&json!({ "message": message })));
                let error = HandlerError::new(HandlerErrorKind::UnknownError, self.name(), message)
                    .with_original_data(core.original_data(raw));
                core.fail(error)
            }
        }
    }
}
