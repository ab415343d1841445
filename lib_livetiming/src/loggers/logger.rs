use log::Level;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// Target used for every line emitted by the engine.
pub const LOG_TARGET: &str = "livetiming";

/// # Logger
///
/// A leveled diagnostic sink gated by a single enable flag. Each component
/// carries its own prefix (`SSE Connection`, `InitialHandler`, `DataStore`, ...)
/// so interleaved output stays attributable.
///
/// Structured extras are passed as an optional `serde_json::Value` and
/// appended to the message in compact JSON form.
#[derive(Debug)]
pub struct Logger {
    /// Lines are dropped while this is `false`.
    enabled: AtomicBool,
    /// Component name shown in brackets before every message.
    prefix: String,
}

impl Logger {
    /// Creates a logger with the given component prefix.
    pub fn new(prefix: impl Into<String>, enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            prefix: prefix.into(),
        }
    }

    /// Whether lines are currently forwarded.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turns output on or off at runtime.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// The component prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Formats one line: `[prefix] message {extra}`.
    pub fn format_line(&self, message: &str, extra: Option<&Value>) -> String {
        match extra {
            Some(data) if !data.is_null() => format!("[{}] {} {}", self.prefix, message, data),
            _ => format!("[{}] {}", self.prefix, message),
        }
    }

    /// Forwards a line at `level` if the logger is enabled.
    pub fn log(&self, level: Level, message: &str, extra: Option<&Value>) {
        if !self.is_enabled() {
            return;
        }
        log::log!(target: LOG_TARGET, level, "{}", self.format_line(message, extra));
    }

    /// Debug-level line.
    pub fn debug(&self, message: &str, extra: Option<&Value>) {
        self.log(Level::Debug, message, extra);
    }

    /// Info-level line.
    pub fn info(&self, message: &str, extra: Option<&Value>) {
        self.log(Level::Info, message, extra);
    }

    /// Warning-level line.
    pub fn warn(&self, message: &str, extra: Option<&Value>) {
        self.log(Level::Warn, message, extra);
    }

    /// Error-level line.
    pub fn error(&self, message: &str, extra: Option<&Value>) {
        self.log(Level::Error, message, extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_line_without_extra() {
        let logger = Logger::new("SSE Connection", true);
        assert_eq!(logger.format_line("connected", None), "[SSE Connection] connected");
        assert_eq!(
            logger.format_line("connected", Some(&Value::Null)),
            "[SSE Connection] connected"
        );
    }

    #[test]
    fn test_format_line_appends_compact_json() {
        let logger = Logger::new("DataStore", false);
        let line = logger.format_line("update applied", Some(&json!({"updateCount": 3})));
        assert_eq!(line, r#"[DataStore] update applied {"updateCount":3}"#);
    }

    #[test]
    fn test_enable_toggle() {
        let logger = Logger::new("x", false);
        assert!(!logger.is_enabled());
        logger.set_enabled(true);
        assert!(logger.is_enabled());
        // Disabled loggers must be callable without side effects.
        logger.set_enabled(false);
        logger.error("ignored", None);
        assert_eq!(logger.prefix(), "x");
    }
}
