use crate::clock::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::emitter::{EventName, ListenerCounts};

/// Lifecycle of the single stream owned by a `ConnectionManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Category of an error reported on the `error` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The stream could not be opened at all.
    InitError,
    /// A named event carried a payload that is not valid JSON.
    ParseError,
    /// An open stream failed or was closed by the server.
    ConnectionError,
    /// The retry budget is spent. Terminal until a manual reconnect.
    MaxRetriesExceeded,
}

/// # Error Event
///
/// Payload of the `error` channel. Optional fields are filled depending on
/// `kind`: retry bookkeeping for connection errors, the event name and raw
/// text for parse errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEventData {
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub will_retry: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<String>,
}

impl ErrorEventData {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: now_millis(),
            retry_count: None,
            will_retry: None,
            event: None,
            raw_data: None,
        }
    }

    pub fn with_retry(mut self, retry_count: u32, will_retry: Option<bool>) -> Self {
        self.retry_count = Some(retry_count);
        self.will_retry = will_retry;
        self
    }

    pub fn with_event(mut self, event: EventName, raw_data: impl Into<String>) -> Self {
        self.event = Some(event);
        self.raw_data = Some(raw_data.into());
        self
    }
}

/// Payload of the `statusChange` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub from: ConnectionStatus,
    pub to: ConnectionStatus,
    pub timestamp: i64,
}

/// # Connection Options
///
/// Retry policy and diagnostics for a `ConnectionManager`. Every field has a
/// default, so a partial JSON object deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionOptions {
    /// Automatic reconnect attempts before giving up.
    pub max_retries: u32,
    /// Delay before the first reconnect attempt, in milliseconds.
    pub initial_retry_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_retry_delay_ms: u64,
    /// Growth factor applied per attempt.
    pub retry_multiplier: f64,
    /// Enables connection diagnostics.
    pub debug: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_retry_delay_ms: 1000,
            max_retry_delay_ms: 30_000,
            retry_multiplier: 2.0,
            debug: false,
        }
    }
}

impl ConnectionOptions {
    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

/// Point-in-time view of a connection, as returned by `ConnectionManager::stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub status: ConnectionStatus,
    pub retry_count: u32,
    pub should_reconnect: bool,
    pub listeners: ListenerCounts,
}
